use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use super::{CollarApi, CollarError, CollarLocation, Credentials};

pub const DEFAULT_API_URL: &str = "https://api.tryfi.com";

const LOGIN_PATH: &str = "auth/login";
const GRAPHQL_PATH: &str = "graphql";

const LOST_MODE: &str = "LOST_DOG";
const NORMAL_MODE: &str = "NORMAL";

const QUERY_HOUSEHOLD_PETS: &str = "query HouseholdPets { currentUser { userHouseholds { household { pets { id name device { moduleId operationParams { mode } } } } } } }";

const QUERY_PET_MODE: &str = "query PetMode($petId: String!) { pet(id: $petId) { device { operationParams { mode } } } }";

const QUERY_PET_LOCATION: &str = "query PetLocation($petId: String!) { pet(id: $petId) { ongoingActivity { __typename ... on OngoingRest { position { latitude longitude } } ... on OngoingWalk { positions { position { latitude longitude } } } } } }";

const MUTATION_SET_MODE: &str = "mutation UpdateDeviceOperationParams($input: UpdateDeviceOperationParamsInput!) { updateDeviceOperationParams(input: $input) { moduleId operationParams { mode } } }";

/// The collar selected at login: the first pet of the account's first household.
#[derive(Debug, Clone)]
struct Session {
    user_id: String,
    pet_id: String,
    module_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user_id: Option<String>,
    session_id: Option<String>,
    error: Option<LoginFailure>,
}

#[derive(Debug, Deserialize)]
struct LoginFailure {
    message: String,
}

/// HTTP client for the TryFi collar API.
///
/// Login stores the session cookie in the client's cookie jar; every later request reuses it.
/// All requests share one timeout.
pub struct TryFiClient {
    http: reqwest::Client,
    base: Url,
    session: Option<Session>,
    last_known: Option<CollarLocation>,
}

impl TryFiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CollarError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        // Joining relative paths needs a trailing slash on the base.
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };

        Ok(Self {
            http,
            base,
            session: None,
            last_known: None,
        })
    }

    fn session(&self) -> Result<&Session, CollarError> {
        self.session
            .as_ref()
            .ok_or(CollarError::SessionUninitialized)
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value, CollarError> {
        let response = self
            .http
            .post(self.base.join(GRAPHQL_PATH)?)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollarError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await?;
        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            return Err(CollarError::Api(errors.to_string()));
        }

        body.get("data")
            .cloned()
            .ok_or_else(|| CollarError::Api("response has no data".to_string()))
    }
}

impl CollarApi for TryFiClient {
    async fn login(&mut self, credentials: &Credentials) -> Result<(), CollarError> {
        self.session = None;

        let response = self
            .http
            .post(self.base.join(LOGIN_PATH)?)
            .form(&[
                ("email", credentials.email.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let login: LoginResponse = response.json().await?;
        if let Some(failure) = login.error {
            return Err(CollarError::Authentication(failure.message));
        }
        let (Some(user_id), Some(_)) = (login.user_id, login.session_id) else {
            return Err(CollarError::Authentication(format!(
                "HTTP {status} without a session"
            )));
        };

        let data = self.graphql(QUERY_HOUSEHOLD_PETS, Value::Null).await?;
        let (pet_id, module_id) = first_pet(&data).ok_or(CollarError::NoPet)?;

        info!(user_id = %user_id, pet_id = %pet_id, "Logged in to collar API");
        self.session = Some(Session {
            user_id,
            pet_id,
            module_id,
        });
        Ok(())
    }

    fn has_session(&self) -> bool {
        self.session.is_some()
    }

    async fn set_lost_mode(&mut self, enabled: bool) -> Result<(), CollarError> {
        let session = self.session()?;
        let mode = if enabled { LOST_MODE } else { NORMAL_MODE };
        let variables = json!({ "input": { "moduleId": session.module_id, "mode": mode } });

        self.graphql(MUTATION_SET_MODE, variables).await?;
        debug!(user_id = %session.user_id, mode, "Collar mode set");
        Ok(())
    }

    async fn is_lost(&mut self) -> Result<bool, CollarError> {
        let session = self.session()?;
        let data = self
            .graphql(QUERY_PET_MODE, json!({ "petId": session.pet_id }))
            .await?;

        data.pointer("/pet/device/operationParams/mode")
            .and_then(Value::as_str)
            .map(|mode| mode == LOST_MODE)
            .ok_or_else(|| CollarError::Api("pet mode missing".to_string()))
    }

    async fn update_location(&mut self) -> Result<bool, CollarError> {
        let session = self.session()?;
        let data = self
            .graphql(QUERY_PET_LOCATION, json!({ "petId": session.pet_id }))
            .await?;

        match activity_position(&data) {
            Some((latitude, longitude)) => {
                self.last_known = Some(CollarLocation {
                    latitude,
                    longitude,
                    fetched_at: unix_now(),
                });
                Ok(true)
            }
            None => {
                warn!("Collar activity has no position");
                Ok(false)
            }
        }
    }

    fn last_known(&self) -> Option<CollarLocation> {
        self.last_known
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Pet id and collar module id of the first pet in the first household.
fn first_pet(data: &Value) -> Option<(String, String)> {
    let pet = data
        .pointer("/currentUser/userHouseholds")?
        .as_array()?
        .iter()
        .filter_map(|h| h.pointer("/household/pets")?.as_array())
        .flatten()
        .next()?;

    let pet_id = pet.get("id")?.as_str()?.to_string();
    let module_id = pet.pointer("/device/moduleId")?.as_str()?.to_string();
    Some((pet_id, module_id))
}

/// Position from the pet's ongoing activity: the rest position, or the last point of a walk.
fn activity_position(data: &Value) -> Option<(f64, f64)> {
    let activity = data.pointer("/pet/ongoingActivity")?;
    let position = match activity.get("__typename")?.as_str()? {
        "OngoingRest" => activity.get("position")?,
        "OngoingWalk" => activity
            .get("positions")?
            .as_array()?
            .last()?
            .get("position")?,
        _ => return None,
    };

    Some((
        position.get("latitude")?.as_f64()?,
        position.get("longitude")?.as_f64()?,
    ))
}
