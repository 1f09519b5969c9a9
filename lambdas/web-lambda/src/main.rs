use adbrief_shared::{
    auth::CognitoAuth, config::Config, session::log_session_events, store::DynamoStore, AppState,
};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{run, tracing, Error};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::load_with_dotenv()?;

    // Initialize AWS clients once at startup
    let aws_config = aws_config::load_from_env().await;

    let auth = CognitoAuth::new(
        CognitoClient::new(&aws_config),
        config.cognito_client_id.clone(),
        config.cognito_client_secret.clone(),
        config.user_pool_id().map(str::to_string),
    );
    let store = DynamoStore::new(DynamoClient::new(&aws_config), &config);

    let state = AppState::new(config, Arc::new(auth), Arc::new(store));
    tokio::spawn(log_session_events(state.sessions.subscribe()));

    run(adbrief_web::router(state)).await
}
