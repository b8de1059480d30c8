//! API routes.

pub mod health;
pub mod users;

pub use health::health_routes;
pub use users::{
    CREATE_SESSION, CREATE_USER, CreateSessionRequest, CreateSessionResponse, CreateUserRequest,
    DELETE_SESSION, GET_CURRENT_USER, LIST_USERS, ListUsersResponse, UserInfo,
    create_session_handler, create_user_handler, delete_session_handler,
    get_current_user_handler, list_users_handler,
};
