use super::config::ControlTokens;

/// Command decoded from one read of a control channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    Stop,
    GetAllAppInfo,
    GetAllWifiInfo,
    Unknown(String),
}

impl ControlTokens {
    /// Decode a chunk read from the control channel
    ///
    /// Bytes are decoded as UTF-8 (invalid sequences replaced) and trailing
    /// whitespace or NUL padding is ignored.
    pub fn parse(&self, raw: &[u8]) -> ControlMessage {
        let text = String::from_utf8_lossy(raw);
        let token = text.trim_end_matches(|c: char| c.is_whitespace() || c == '\0');

        if token == self.stop {
            ControlMessage::Stop
        } else if token == self.app_list {
            ControlMessage::GetAllAppInfo
        } else if token == self.wifi_list {
            ControlMessage::GetAllWifiInfo
        } else {
            ControlMessage::Unknown(token.to_string())
        }
    }
}
