//! Response schema generation (Gemini OpenAPI subset: upper-case type names).

use serde_json::json;

/// Generator for object response schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaGenerator {
    description: Option<String>,
    properties: Vec<(String, serde_json::Value)>,
    required: Vec<String>,
}

impl SchemaGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn add_property(mut self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.properties.push((name.into(), schema));
        self
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    pub fn build(self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("type".into(), json!("OBJECT"));

        let mut properties = serde_json::Map::new();
        for (name, schema) in self.properties {
            properties.insert(name, schema);
        }
        map.insert("properties".into(), properties.into());

        if !self.required.is_empty() {
            map.insert("required".into(), self.required.into());
        }
        if let Some(desc) = self.description {
            map.insert("description".into(), desc.into());
        }

        map.into()
    }
}

pub fn string_schema(description: Option<&str>) -> serde_json::Value {
    match description {
        Some(d) => json!({"type": "STRING", "description": d}),
        None => json!({"type": "STRING"}),
    }
}

pub fn string_array_schema(description: Option<&str>) -> serde_json::Value {
    let mut v = json!({"type": "ARRAY", "items": {"type": "STRING"}});
    if let Some(d) = description {
        v["description"] = json!(d);
    }
    v
}

/// `{ premise: string, outline: string[] }`
pub fn outline_schema() -> serde_json::Value {
    SchemaGenerator::new()
        .add_property("premise", string_schema(Some("Extended plot premise / blurb")))
        .add_property(
            "outline",
            string_array_schema(Some("12 to 20 chronological chapter titles")),
        )
        .required("premise")
        .required("outline")
        .build()
}

/// `{ events: string[], character_updates: string[], tone_summary: string }`
pub fn memory_schema() -> serde_json::Value {
    SchemaGenerator::new()
        .add_property("events", string_array_schema(None))
        .add_property("character_updates", string_array_schema(None))
        .add_property("tone_summary", string_schema(None))
        .required("events")
        .required("character_updates")
        .required("tone_summary")
        .build()
}

/// `{ beats: string[] }`
pub fn beats_schema() -> serde_json::Value {
    SchemaGenerator::new()
        .description("Plot beats for the next chapter")
        .add_property("beats", string_array_schema(Some("Exactly three short beats")))
        .required("beats")
        .build()
}
