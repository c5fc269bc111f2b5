//! Resource records and tag lookup
//!
//! A [`ResourceRecord`] is an immutable snapshot of one provider object as
//! returned by a list call. Tags are read through [`TagMap`], which scans the
//! record's `Tags` list on demand.

use serde_json::Value;

/// Key of the tag list on every taggable record
const TAGS_FIELD: &str = "Tags";

/// One provider object, as returned by the upstream list call
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord(Value);

impl ResourceRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Walk a dot-notation path; numeric segments index into arrays
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = &self.0;

        for part in path.split('.') {
            current = match part.parse::<usize>() {
                Ok(idx) if current.is_array() => current.get(idx)?,
                _ => current.get(part)?,
            };
        }

        match current {
            Value::Null => None,
            v => Some(v),
        }
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(|v| v.as_str())
    }

    pub fn tags(&self) -> TagMap<'_> {
        let tags = self
            .0
            .get(TAGS_FIELD)
            .and_then(|v| v.as_array())
            .map(|arr| arr.as_slice())
            .unwrap_or(&[]);
        TagMap { tags }
    }
}

impl From<Value> for ResourceRecord {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Lookup over a record's `[{Key, Value}]` tag list
#[derive(Debug, Clone, Copy)]
pub struct TagMap<'a> {
    tags: &'a [Value],
}

impl<'a> TagMap<'a> {
    /// First value stored under `key`; `None` when the key is absent
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Tags in the order they were written
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.tags.iter().filter_map(|tag| {
            let key = tag.get("Key")?.as_str()?;
            let value = tag.get("Value").and_then(|v| v.as_str()).unwrap_or("");
            Some((key, value))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// `k1=v1, k2=v2` rendering used by the tag listings
    pub fn joined(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance() -> ResourceRecord {
        ResourceRecord::new(json!({
            "InstanceId": "i-0123456789abcdef0",
            "State": {"Name": "running"},
            "BlockDeviceMappings": [{"Ebs": {"VolumeSize": 15}}],
            "PublicDnsName": null,
            "Tags": [
                {"Key": "Name", "Value": "alice"},
                {"Key": "Owner", "Value": "ops"},
                {"Key": "Name", "Value": "shadowed"}
            ]
        }))
    }

    #[test]
    fn test_first_tag_wins() {
        let record = instance();
        assert_eq!(record.tags().get("Name"), Some("alice"));
        assert_eq!(record.tags().get("Owner"), Some("ops"));
    }

    #[test]
    fn test_missing_tag_is_absent_not_empty() {
        let record = instance();
        assert_eq!(record.tags().get("Team"), None);
    }

    #[test]
    fn test_record_without_tags() {
        let record = ResourceRecord::new(json!({"InstanceId": "i-1"}));
        assert!(record.tags().is_empty());
        assert_eq!(record.tags().get("Name"), None);
        assert_eq!(record.tags().joined(), "");
    }

    #[test]
    fn test_joined_keeps_write_order() {
        assert_eq!(
            instance().tags().joined(),
            "Name=alice, Owner=ops, Name=shadowed"
        );
    }

    #[test]
    fn test_get_path_dotted_and_indexed() {
        let record = instance();
        assert_eq!(record.get_str("State.Name"), Some("running"));
        assert_eq!(
            record.get_path("BlockDeviceMappings.0.Ebs.VolumeSize"),
            Some(&json!(15))
        );
        assert_eq!(record.get_path("BlockDeviceMappings.3.Ebs"), None);
        assert_eq!(record.get_path("Nope.Deeper"), None);
    }

    #[test]
    fn test_null_is_absent() {
        assert_eq!(instance().get_path("PublicDnsName"), None);
    }
}
