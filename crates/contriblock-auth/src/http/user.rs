/*
[INPUT]:  Bearer token from the session store
[OUTPUT]: Current user record
[POS]:    HTTP layer - user endpoints (require bearer auth)
[UPDATE]: When adding new user endpoints or changing profile fields
*/

// ### User Endpoints

use reqwest::Method;

use crate::http::{ApiClient, Result};
use crate::types::{UpdateUserRequest, User};

impl ApiClient {
    /// Fetch the user for the stored session
    ///
    /// GET /api/v1/users/me
    pub async fn get_current_user(&self) -> Result<User> {
        let builder = self.request(Method::GET, "api/v1/users/me")?;
        self.send_json(builder).await
    }

    /// Fetch the user for an explicit token
    ///
    /// GET /api/v1/users/me
    pub async fn get_user_with_token(&self, token: &str) -> Result<User> {
        let builder = self.request_with_token(Method::GET, "api/v1/users/me", token)?;
        self.send_json(builder).await
    }

    /// Update profile fields of the current user
    ///
    /// PUT /api/v1/users/me
    pub async fn update_current_user(&self, update: &UpdateUserRequest) -> Result<User> {
        let builder = self
            .request(Method::PUT, "api/v1/users/me")?
            .json(update);
        self.send_json(builder).await
    }
}
