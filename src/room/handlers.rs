use axum::{
    extract::{Path, State},
    Extension, Json,
};
use tracing::{info, instrument};

use super::types::{HistoryEntry, RoomCreateRequest, RoomDetailResponse, RoomIndexResponse, RoomResponse};
use crate::{
    auth::AuthClaims,
    message::load_history,
    shared::{AppError, AppState},
};

/// HTTP handler for the room index
///
/// GET /rooms
/// Public rooms, the caller's private rooms and the users they could start a private chat with
#[instrument(name = "list_rooms", skip(state, claims), fields(username = %claims.username))]
pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
) -> Result<Json<RoomIndexResponse>, AppError> {
    let directory = &state.room_directory;

    let public_rooms = directory.list_public_rooms().await?;
    let private_rooms = directory.list_private_rooms_for(&claims.username).await?;
    let other_users = directory.list_other_users(&claims.username).await?;

    info!(
        public_count = public_rooms.len(),
        private_count = private_rooms.len(),
        "Rooms listed successfully"
    );

    Ok(Json(RoomIndexResponse {
        public_rooms: public_rooms.into_iter().map(RoomResponse::from).collect(),
        private_rooms: private_rooms.into_iter().map(RoomResponse::from).collect(),
        other_users,
    }))
}

/// HTTP handler for creating (or reopening) a group room
///
/// POST /rooms
#[instrument(name = "create_group_room", skip(state, claims), fields(username = %claims.username))]
pub async fn create_group_room(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Json(request): Json<RoomCreateRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = state
        .room_directory
        .resolve_or_create_group_room(&request.room_name, &claims.username)
        .await?;

    Ok(Json(room.into()))
}

/// POST /rooms/private/:username
#[instrument(name = "start_private_room", skip(state, claims), fields(username = %claims.username))]
pub async fn start_private_room(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(recipient): Path<String>,
) -> Result<Json<RoomResponse>, AppError> {
    let room = state
        .room_directory
        .get_or_create_private_room(&claims.username, &recipient)
        .await?;

    Ok(Json(room.into()))
}

/// HTTP handler for a single room page
///
/// GET /rooms/:room_name
/// Private rooms are only visible to their members
#[instrument(name = "get_room", skip(state, claims), fields(username = %claims.username))]
pub async fn get_room(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(room_name): Path<String>,
) -> Result<Json<RoomDetailResponse>, AppError> {
    let directory = &state.room_directory;
    let room = directory.resolve_room(&room_name).await?;
    directory.ensure_access(&room, &claims.username).await?;

    let messages = load_history(
        state.message_repository.as_ref(),
        &room.id,
        state.config.history_limit,
    )
    .await?;
    let online_users = state.registry.online_users(&room.id).await;

    Ok(Json(RoomDetailResponse {
        room: room.into(),
        messages: messages.into_iter().map(HistoryEntry::from).collect(),
        online_users,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::{AuthResponse, CredentialsRequest};
    use crate::config::ServerConfig;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::{get, post},
        Router,
    };
    use tower::ServiceExt; // for `oneshot`

    struct TestApp {
        state: AppState,
        router: Router,
    }

    fn test_app() -> TestApp {
        let state = AppState::in_memory(ServerConfig {
            bcrypt_cost: crate::config::MIN_BCRYPT_COST,
            ..ServerConfig::default()
        });

        let router = Router::new()
            .route("/rooms", get(list_rooms).post(create_group_room))
            .route("/rooms/private/:username", post(start_private_room))
            .route("/rooms/:room_name", get(get_room))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                crate::auth::jwt_auth,
            ))
            .with_state(state.clone());

        TestApp { state, router }
    }

    async fn register(state: &AppState, username: &str) -> AuthResponse {
        state
            .auth_service
            .register(CredentialsRequest {
                username: username.to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap()
    }

    fn request(method: &str, uri: &str, token: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token));
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_create_group_room_handler() {
        let app = test_app();
        let alice = register(&app.state, "alice").await;

        let response = app
            .router
            .clone()
            .oneshot(request("POST", "/rooms", &alice.token, Some(r#"{"room_name": "general"}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let room: RoomResponse = body_json(response).await;
        assert_eq!(room.name, "general");
        assert!(!room.is_private);

        // Creating it again returns the same room
        let response = app
            .router
            .oneshot(request("POST", "/rooms", &alice.token, Some(r#"{"room_name": "general"}"#)))
            .await
            .unwrap();
        let again: RoomResponse = body_json(response).await;
        assert_eq!(again.id, room.id);
    }

    #[tokio::test]
    async fn test_create_group_room_invalid_name() {
        let app = test_app();
        let alice = register(&app.state, "alice").await;

        let response = app
            .router
            .oneshot(request("POST", "/rooms", &alice.token, Some(r#"{"room_name": "no spaces!"}"#)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_group_room_malformed_json() {
        let app = test_app();
        let alice = register(&app.state, "alice").await;

        let response = app
            .router
            .oneshot(request("POST", "/rooms", &alice.token, Some(r#"{"name": "general"}"#)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_rooms_require_authentication() {
        let app = test_app();

        let response = app
            .router
            .oneshot(Request::builder().uri("/rooms").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_rooms_index() {
        let app = test_app();
        let alice = register(&app.state, "alice").await;
        let bob = register(&app.state, "bob").await;
        register(&app.state, "carol").await;

        app.router
            .clone()
            .oneshot(request("POST", "/rooms", &alice.token, Some(r#"{"room_name": "general"}"#)))
            .await
            .unwrap();
        app.router
            .clone()
            .oneshot(request("POST", "/rooms/private/bob", &alice.token, None))
            .await
            .unwrap();

        let response = app
            .router
            .clone()
            .oneshot(request("GET", "/rooms", &bob.token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let index: RoomIndexResponse = body_json(response).await;
        assert_eq!(index.public_rooms.len(), 1);
        assert_eq!(index.public_rooms[0].name, "general");
        assert_eq!(index.private_rooms.len(), 1);
        assert_eq!(index.private_rooms[0].name, "private_alice_bob");
        assert_eq!(index.other_users, vec!["alice", "carol"]);

        // carol is not part of the private room
        let carol_login = app
            .state
            .auth_service
            .login(CredentialsRequest {
                username: "carol".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        let response = app
            .router
            .oneshot(request("GET", "/rooms", &carol_login.token, None))
            .await
            .unwrap();
        let index: RoomIndexResponse = body_json(response).await;
        assert!(index.private_rooms.is_empty());
    }

    #[tokio::test]
    async fn test_start_private_room_errors() {
        let app = test_app();
        let alice = register(&app.state, "alice").await;

        let response = app
            .router
            .clone()
            .oneshot(request("POST", "/rooms/private/alice", &alice.token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .router
            .oneshot(request("POST", "/rooms/private/nobody", &alice.token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_room_with_history() {
        let app = test_app();
        let alice = register(&app.state, "alice").await;
        let room = app
            .state
            .room_directory
            .resolve_or_create_group_room("general", "alice")
            .await
            .unwrap();
        for content in ["first", "second"] {
            app.state
                .message_repository
                .append(&room.id, "alice", content)
                .await
                .unwrap();
        }

        let response = app
            .router
            .oneshot(request("GET", "/rooms/general", &alice.token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let detail: RoomDetailResponse = body_json(response).await;
        assert_eq!(detail.room.id, room.id);
        let contents: Vec<&str> = detail.messages.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert!(detail.online_users.is_empty());
    }

    #[tokio::test]
    async fn test_get_room_not_found_and_forbidden() {
        let app = test_app();
        register(&app.state, "alice").await;
        register(&app.state, "bob").await;
        let mallory = register(&app.state, "mallory").await;
        app.state
            .room_directory
            .get_or_create_private_room("alice", "bob")
            .await
            .unwrap();

        let response = app
            .router
            .clone()
            .oneshot(request("GET", "/rooms/missing", &mallory.token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .router
            .oneshot(request("GET", "/rooms/private_alice_bob", &mallory.token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
