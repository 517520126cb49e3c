use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

const TWITCH_TOKEN_ENDPOINT: &str = "https://id.twitch.tv/oauth2/token";
const TWITCH_USER_ENDPOINT: &str = "https://api.twitch.tv/helix/users";

// matches:
// https://twitch.tv/username
// http://twitch.tv/username
// twitch.tv/username
// (anything else is treated as a bare login name)
static TWITCH_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(https?://)?twitch\.tv/(.+)$").unwrap());

/// Users paste either a login name or their channel URL; accept both.
pub fn channel_login(input: &str) -> &str {
    match TWITCH_URL.captures(input) {
        Some(caps) => caps.get(2).map_or(input, |m| m.as_str()),
        None => input,
    }
}

#[derive(Debug, Clone)]
pub struct TwitchUser {
    pub id: i64,
    pub login: String,
    pub profile_image_url: String,
}

// helix returns ids as strings
#[derive(Deserialize)]
struct WireUser {
    id: String,
    login: String,
    #[serde(default)]
    profile_image_url: String,
}

#[derive(Deserialize)]
struct UsersResponse {
    data: Vec<WireUser>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl WireUser {
    fn into_user(self) -> anyhow::Result<TwitchUser> {
        let id = self
            .id
            .parse()
            .with_context(|| format!("twitch returned a non-numeric user id: {:?}", self.id))?;
        Ok(TwitchUser {
            id,
            login: self.login,
            profile_image_url: self.profile_image_url,
        })
    }
}

/// Helix client holding the app access token. The token is fetched once at
/// startup and never refreshed; the process restarts often enough.
#[derive(Debug, Clone)]
pub struct TwitchClient {
    http: Client,
    client_id: String,
    token: String,
}

impl TwitchClient {
    pub async fn connect(client_id: String, client_secret: String) -> anyhow::Result<Self> {
        let http = Client::new();

        tracing::info!("grabbing twitch token");
        let resp: TokenResponse = http
            .post(TWITCH_TOKEN_ENDPOINT)
            .query(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .context("twitch token request failed")?
            .error_for_status()
            .context("twitch rejected the token request")?
            .json()
            .await
            .context("twitch token response was not json")?;
        tracing::info!("got twitch token");

        Ok(Self {
            http,
            client_id,
            token: resp.access_token,
        })
    }

    /// Look a user up by login name. API errors are logged and reported as
    /// "not found" so the caller renders the same user-facing miss.
    pub async fn user_by_login(&self, login: &str) -> anyhow::Result<Option<TwitchUser>> {
        let resp = self
            .http
            .get(TWITCH_USER_ENDPOINT)
            .query(&[("login", login)])
            .bearer_auth(&self.token)
            .header("Client-Id", &self.client_id)
            .send()
            .await
            .context("twitch user lookup failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let message = resp
                .json::<ApiError>()
                .await
                .map(|e| e.message)
                .unwrap_or_default();
            tracing::error!(%status, %message, "twitch user lookup returned an error");
            return Ok(None);
        }

        let users: UsersResponse = resp.json().await.context("twitch user response was not json")?;
        match users.data.into_iter().next() {
            Some(user) => Ok(Some(user.into_user()?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_login_strips_urls() {
        assert_eq!(channel_login("https://twitch.tv/somebody"), "somebody");
        assert_eq!(channel_login("http://twitch.tv/somebody"), "somebody");
        assert_eq!(channel_login("twitch.tv/somebody"), "somebody");
    }

    #[test]
    fn channel_login_passes_plain_names_through() {
        assert_eq!(channel_login("somebody"), "somebody");
        assert_eq!(channel_login("twitch_fan_42"), "twitch_fan_42");
    }

    #[test]
    fn wire_user_parses_string_ids() {
        let resp: UsersResponse = serde_json::from_str(
            r#"{"data":[{"id":"141981764","login":"somebody","profile_image_url":"https://example.com/p.png"}]}"#,
        )
        .unwrap();
        let user = resp.data.into_iter().next().unwrap().into_user().unwrap();
        assert_eq!(user.id, 141981764);
        assert_eq!(user.login, "somebody");
    }

    #[test]
    fn wire_user_rejects_garbage_ids() {
        let wire = WireUser {
            id: "not-a-number".into(),
            login: "x".into(),
            profile_image_url: String::new(),
        };
        assert!(wire.into_user().is_err());
    }

    #[test]
    fn empty_data_means_not_found() {
        let resp: UsersResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(resp.data.is_empty());
    }
}
