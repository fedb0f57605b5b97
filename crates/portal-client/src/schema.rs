//! Typed bodies of the portal endpoints.
//!
//! The server adds many fields we do not use; serde ignores them.

use serde::Deserialize;

/// `error` value meaning success on every endpoint.
pub(crate) const OK: &str = "ok";

/// `/cgi-bin/rad_user_info`
#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoResponse {
    pub error: String,
    #[serde(default)]
    pub online_ip: Option<String>,
    #[serde(default)]
    pub client_ip: Option<String>,
}

/// `/cgi-bin/get_challenge`
#[derive(Debug, Deserialize)]
pub(crate) struct ChallengeResponse {
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

/// `/cgi-bin/srun_portal` for both login and logout.
#[derive(Debug, Deserialize)]
pub(crate) struct ActionResponse {
    pub error: String,
    #[serde(default)]
    pub error_msg: Option<String>,
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonp::decode;

    #[test]
    fn user_info_with_extra_fields() {
        let info: UserInfoResponse = decode(
            r#"jQuery({"ServerFlag":0,"error":"ok","online_ip":"10.1.2.3","user_name":"alice","sum_bytes":123})"#,
        )
        .unwrap();
        assert_eq!(info.error, "ok");
        assert_eq!(info.online_ip.as_deref(), Some("10.1.2.3"));
        assert!(info.client_ip.is_none());
    }

    #[test]
    fn user_info_requires_error_field() {
        let result: crate::PortalResult<UserInfoResponse> = decode(r#"{"online_ip":"10.1.2.3"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn action_response_keeps_message() {
        let resp: ActionResponse =
            decode(r#"{"error":"login_error","error_msg":"E2620: Already online."}"#).unwrap();
        assert_eq!(resp.error, "login_error");
        assert_eq!(resp.error_msg.as_deref(), Some("E2620: Already online."));
    }

    #[test]
    fn non_empty_filters_blank() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some(" abc ".into())), Some("abc".into()));
        assert_eq!(non_empty(None), None);
    }
}
