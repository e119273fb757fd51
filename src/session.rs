use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST /auth/login`.
#[derive(Serialize, Deserialize, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The authenticated principal, persisted as JSON under the `admin` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    #[serde(alias = "_id", deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub data: AuthResponseData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponseData {
    pub admin: AdminUser,
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// A token together with the user it was issued to. Holding both in one
/// value keeps a half-populated session unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: AdminUser,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_response_shape() {
        let body = json!({
            "status": "success",
            "token": "t",
            "data": { "admin": { "id": "1", "username": "a", "email": "a@x.com", "role": "admin" } }
        });
        let parsed: AuthResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.token, "t");
        assert_eq!(parsed.data.admin.username, "a");
    }

    #[test]
    fn test_admin_id_accepts_numbers_and_mongo_alias() {
        let numeric: AdminUser = serde_json::from_value(
            json!({ "id": 7, "username": "a", "email": "a@x.com", "role": "admin" }),
        )
        .unwrap();
        assert_eq!(numeric.id, "7");

        let aliased: AdminUser = serde_json::from_value(
            json!({ "_id": "65f0c1", "username": "a", "email": "a@x.com", "role": "editor" }),
        )
        .unwrap();
        assert_eq!(aliased.id, "65f0c1");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials { email: "a@x.com".into(), password: "hunter2".into() };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
