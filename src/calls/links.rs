use crate::error::{Result, SessionError};

/// Builds the URL a peer opens to join a room's call.
pub trait LinkBuilder: Send + Sync {
    fn build_join_call_url(&self, room_id: &str) -> Result<String>;
}

impl<F> LinkBuilder for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn build_join_call_url(&self, room_id: &str) -> Result<String> {
        self(room_id)
    }
}

/// `{base}/{room}?call=1`, with the room id percent-encoded.
#[derive(Debug, Clone)]
pub struct BaseUrlLinkBuilder {
    base: String,
}

impl BaseUrlLinkBuilder {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }
}

impl LinkBuilder for BaseUrlLinkBuilder {
    fn build_join_call_url(&self, room_id: &str) -> Result<String> {
        let base = self.base.trim_end_matches('/');
        if base.is_empty() {
            return Err(SessionError::LinkBuilder("no join base url configured".into()));
        }
        if room_id.is_empty() {
            return Err(SessionError::InvalidRoomId);
        }
        Ok(format!("{base}/{}?call=1", urlencoding::encode(room_id)))
    }
}

/// Locally constructed link used when the configured builder fails.
pub fn fallback_join_url(base: &str, room_id: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        urlencoding::encode(room_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_room_ids() {
        let builder = BaseUrlLinkBuilder::new("https://chat.example/join/");
        assert_eq!(
            builder.build_join_call_url("team room/1").unwrap(),
            "https://chat.example/join/team%20room%2F1?call=1"
        );
    }

    #[test]
    fn rejects_missing_base() {
        let builder = BaseUrlLinkBuilder::new("");
        assert!(matches!(
            builder.build_join_call_url("r1"),
            Err(SessionError::LinkBuilder(_))
        ));
    }

    #[test]
    fn closures_act_as_builders() {
        let builder = |room: &str| -> Result<String> { Ok(format!("app://{room}")) };
        assert_eq!(builder.build_join_call_url("r1").unwrap(), "app://r1");
    }

    #[test]
    fn fallback_is_plain_path() {
        assert_eq!(fallback_join_url("https://x/", "a b"), "https://x/a%20b");
    }
}
