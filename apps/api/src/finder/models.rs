use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A sellable bundle of matching family pajamas, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kit {
    pub handle: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub product_titles: String,
    #[serde(
        default,
        deserialize_with = "lenient_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
}

/// Display fields accept any JSON scalar: numbers and booleans keep their text form,
/// `null`, arrays and objects become empty. Only `handle` is strictly typed.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    })
}

fn lenient_url<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Body of `POST /pajama-finder`. Both fields are optional here so that an absent field
/// is reported as a bad request by validation rather than as a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinderRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub kits: Option<Vec<Kit>>,
}

/// The projection of a kit that is echoed into the prompt. `url` never reaches the model.
#[derive(Debug, Serialize)]
pub struct KitForModel<'a> {
    pub handle: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub product_titles: &'a str,
}

impl<'a> From<&'a Kit> for KitForModel<'a> {
    fn from(kit: &'a Kit) -> Self {
        Self {
            handle: &kit.handle,
            title: &kit.title,
            description: &kit.description,
            product_titles: &kit.product_titles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub handle: String,
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinderResponse {
    pub recommendations: Vec<Recommendation>,
}

impl FinderResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}
