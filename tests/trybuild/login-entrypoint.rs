use guru_auth_client::{AuthClient, RestResult};
use serde::Deserialize;

#[derive(Deserialize)]
struct Session {
    token: String,
}

fn assert_send<T: Send>(_: &T) {}

fn main() {
    let client = AuthClient::new().with_base_url(String::from("http://127.0.0.1:1"));
    let payload = sonic_rs::json!({"username": "alice", "password": "secret"});

    let login = async move {
        let session: RestResult<Session> = client.login(&payload).await;
        session.map(|s| s.token)
    };
    assert_send(&login);
}
