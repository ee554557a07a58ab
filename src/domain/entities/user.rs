use std::fmt;

/// A guild member as seen by the host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub nickname: Option<String>,
    pub roles: Vec<i64>,
    pub is_bot: bool,
}

impl User {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            nickname: None,
            roles: Vec::new(),
            is_bot: false,
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn with_roles(mut self, roles: Vec<i64>) -> Self {
        self.roles = roles;
        self
    }

    pub fn has_any_role(&self, roles: &[i64]) -> bool {
        self.roles.iter().any(|r| roles.contains(r))
    }

    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.username)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
