//! Broker topic layout, templated on the device client id.
//!
//! ```text
//! reader/<id>/cmd/{rfid,power,inventory}     inbound commands
//! reader/<id>/data/{tags,batch,response}     outbound data
//! <publish_topic>/status                      retained online/offline marker
//! ```

use crate::commands::CommandFamily;

const ROOT: &str = "reader";
const DEFAULT_STATUS_ROOT: &str = "rfid";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    client_id: String,
    publish_topic: String,
}

impl Topics {
    pub fn new(client_id: impl Into<String>, publish_topic: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            publish_topic: publish_topic.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn command(&self, family: CommandFamily) -> String {
        format!("{}/{}/cmd/{}", ROOT, self.client_id, family.as_str())
    }

    /// Subscription filter covering every command family.
    pub fn command_filter(&self) -> String {
        format!("{}/{}/cmd/+", ROOT, self.client_id)
    }

    pub fn tags(&self) -> String {
        self.data("tags")
    }

    pub fn batch(&self) -> String {
        self.data("batch")
    }

    pub fn response(&self) -> String {
        self.data("response")
    }

    pub fn status(&self) -> String {
        let root = self.publish_topic.trim_end_matches('/');
        if root.is_empty() {
            format!("{}/status", DEFAULT_STATUS_ROOT)
        } else {
            format!("{}/status", root)
        }
    }

    /// Family of an inbound command topic addressed to this device.
    pub fn parse_command(&self, topic: &str) -> Option<CommandFamily> {
        let rest = topic.strip_prefix(ROOT)?.strip_prefix('/')?;
        let rest = rest.strip_prefix(self.client_id.as_str())?;
        let suffix = rest.strip_prefix("/cmd/")?;
        CommandFamily::from_suffix(suffix)
    }

    fn data(&self, kind: &str) -> String {
        format!("{}/{}/data/{}", ROOT, self.client_id, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let t = Topics::new("gw-01", "site/dock");
        assert_eq!(t.command(CommandFamily::Power), "reader/gw-01/cmd/power");
        assert_eq!(t.batch(), "reader/gw-01/data/batch");
        assert_eq!(t.response(), "reader/gw-01/data/response");
        assert_eq!(t.status(), "site/dock/status");
        assert_eq!(Topics::new("x", "").status(), "rfid/status");
    }

    #[test]
    fn parses_only_own_command_topics() {
        let t = Topics::new("gw-01", "site");
        assert_eq!(
            t.parse_command("reader/gw-01/cmd/inventory"),
            Some(CommandFamily::Inventory)
        );
        assert_eq!(t.parse_command("reader/gw-01/cmd/rfid"), Some(CommandFamily::Rfid));
        assert_eq!(t.parse_command("reader/gw-02/cmd/rfid"), None);
        assert_eq!(t.parse_command("reader/gw-01/cmd/rfid/extra"), None);
        assert_eq!(t.parse_command("reader/gw-01/data/tags"), None);
        assert_eq!(t.parse_command("reader/gw-010/cmd/rfid"), None);
    }
}
