use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use trend_core::TrendJudgment;

/// Types that can be requested as strict OpenAI structured output.
///
/// OpenAI's strict mode wants `additionalProperties: false` on every object,
/// every property listed in `required`, and no `$ref` indirection.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    fn openai_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        fix_object_schemas(&mut value);
        inline_refs(&mut value);

        if let Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// The judge's verdict on one cluster, as the model returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrendAnalysis {
    /// True only if the cluster contains a coherent, nameable visual aesthetic (not just a topic).
    pub valid: bool,
    /// 0 to 100. 0 = no visual relevance, 100 = extremely strong, cohesive visual aesthetic signal.
    pub relevance_score: i64,
    /// 2-5 word AESTHETIC NAME ONLY. Do NOT include words like 'chat widget', 'overlay', 'alert',
    /// 'stream', 'streaming', 'setup', 'tutorial', 'pack', 'theme'. Example: 'Cozy Pixel Farm'.
    pub trend_name: String,
    /// 1 sentence describing the visual aesthetic. Do NOT mention 'chat widget', 'overlay', or 'alert'.
    pub summary: String,
    /// 3-8 short phrases describing the look (palette/texture/typography/era). NO product names.
    /// Do NOT include words like 'overlay', 'widget', 'alert', 'stream', 'tutorial'.
    pub aesthetic_keywords: String,
}

impl From<TrendAnalysis> for TrendJudgment {
    fn from(analysis: TrendAnalysis) -> Self {
        TrendJudgment {
            valid: analysis.valid,
            relevance_score: analysis.relevance_score,
            trend_name: analysis.trend_name,
            summary: analysis.summary,
            aesthetic_keywords: analysis.aesthetic_keywords,
        }
    }
}

fn fix_object_schemas(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type") == Some(&Value::String("object".to_string())) {
                map.insert("additionalProperties".to_string(), Value::Bool(false));

                if let Some(Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<Value> =
                        props.keys().map(|k| Value::String(k.clone())).collect();
                    map.insert("required".to_string(), Value::Array(all_keys));
                }
            }

            for (_, v) in map.iter_mut() {
                fix_object_schemas(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                fix_object_schemas(item);
            }
        }
        _ => {}
    }
}

fn inline_refs(value: &mut Value) {
    let definitions = match value {
        Value::Object(map) => map.get("definitions").cloned(),
        _ => None,
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(def) = ref_path
                    .strip_prefix("#/definitions/")
                    .and_then(|name| definitions.get(name))
                {
                    *value = def.clone();
                    inline_refs_recursive(value, definitions);
                    return;
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_analysis_schema_is_strict() {
        let schema = TrendAnalysis::openai_schema();
        let object = schema.as_object().unwrap();

        assert!(!object.contains_key("$schema"));
        assert!(!object.contains_key("definitions"));
        assert_eq!(object.get("additionalProperties"), Some(&Value::Bool(false)));

        let required: Vec<&str> = object["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        for field in [
            "valid",
            "relevance_score",
            "trend_name",
            "summary",
            "aesthetic_keywords",
        ] {
            assert!(required.contains(&field), "{field} must be required");
        }
    }

    #[test]
    fn test_field_docs_become_descriptions() {
        let schema = TrendAnalysis::openai_schema();
        let description = schema["properties"]["trend_name"]["description"]
            .as_str()
            .unwrap();
        assert!(description.contains("AESTHETIC NAME ONLY"));
    }

    #[test]
    fn test_analysis_converts_to_judgment() {
        let analysis = TrendAnalysis {
            valid: true,
            relevance_score: 82,
            trend_name: "Cozy Pixel Farm".to_string(),
            summary: "Warm earthy pixel art".to_string(),
            aesthetic_keywords: "pixel art, earthy palette".to_string(),
        };

        let judgment = TrendJudgment::from(analysis);
        assert!(judgment.valid);
        assert_eq!(judgment.relevance_score, 82);
        assert_eq!(judgment.trend_name, "Cozy Pixel Farm");
    }
}
