use serde::{Deserialize, Serialize};

/// Owner resolved from a verified session token
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
}

/// JWT Claims issued by the session provider
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: usize,  // expiration time
    #[serde(default)]
    pub iat: usize, // issued at
}
