use guru_auth_client::{RestResult, login_guru};
use sonic_rs::Value;

fn assert_send<T: Send>(_: &T) {}

fn main() {
    let payload = sonic_rs::json!({"username": "alice", "password": "secret"});

    let login = async move {
        let data: RestResult<Value> = login_guru(&payload).await;
        data
    };
    assert_send(&login);
}
