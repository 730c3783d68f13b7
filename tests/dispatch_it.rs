use httpmock::prelude::*;
use std::time::{Duration, Instant};
use wenxin_hub::{Config, LlmResponse, Manager};

const OK_BODY: &str = r#"{"id":"as-1","result":"好的","usage":{"prompt_tokens":5,"completion_tokens":4,"total_tokens":9}}"#;

fn config_for(server: &MockServer, accounts: &[(&str, u32)], pool: &str) -> Config {
    let mut toml = format!(
        "[endpoints]\ntoken_url = \"{}\"\ncompletion_url = \"{}\"\n\n[pool]\nbackoff_ms = 50\n{pool}\n\n[prompts]\nnotice = \"请生成一条通知: {{content}}\"\necho = \"{{content}}\"\n",
        server.url("/oauth/2.0/token"),
        server.url("/chat"),
    );
    for (name, rate) in accounts {
        toml.push_str(&format!(
            "\n[[accounts]]\nprovider = \"baidu\"\nname = \"{name}\"\napi_key = \"ak-{name}\"\nsecret_key = \"sk-{name}\"\nmax_calls_per_second = {rate}\n"
        ));
    }

    Config::from_toml_str(&toml).expect("Test configuration should parse.")
}

async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/2.0/token");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"access_token":"tok","expires_in":2592000}"#);
        })
        .await
}

#[tokio::test]
async fn start_primes_every_worker_once() {
    let server = MockServer::start_async().await;
    let token_mock = mock_token(&server).await;
    let cfg = config_for(&server, &[("a", 1), ("b", 1), ("未知用户", 1)], "");

    let manager = Manager::start(&cfg).await.expect("Pool should start.");

    assert_eq!(manager.worker_count(), 2);
    assert_eq!(manager.token_refreshes(), 2);
    token_mock.assert_calls_async(2).await;

    manager.shutdown().await;
}

#[tokio::test]
async fn start_fails_when_token_endpoint_rejects() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/oauth/2.0/token");
            then.status(401).body(r#"{"error":"invalid_client"}"#);
        })
        .await;
    let cfg = config_for(&server, &[("a", 1)], "");

    assert!(Manager::start(&cfg).await.is_err());
}

#[tokio::test]
async fn notice_template_sends_exact_user_message() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat").query_param("access_token", "tok").json_body(
                serde_json::json!({
                    "messages": [{ "role": "user", "content": "请生成一条通知: 明天放假" }]
                }),
            );
            then.status(200).header("content-type", "application/json").body(OK_BODY);
        })
        .await;
    let manager = Manager::start(&config_for(&server, &[("a", 2)], "")).await.unwrap();

    let got = manager.request("明天放假", "notice").await;

    assert_eq!(got, LlmResponse::success("好的", 9));
    chat_mock.assert_calls_async(1).await;

    manager.shutdown().await;
}

#[tokio::test]
async fn unsupported_prompt_type_performs_no_network_calls() {
    let server = MockServer::start_async().await;
    let token_mock = mock_token(&server).await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).body(OK_BODY);
        })
        .await;
    let manager = Manager::start(&config_for(&server, &[("a", 2)], "")).await.unwrap();

    let got = manager.request("hello", "poem").await;

    assert_eq!(got.error(), Some("unsupported type: poem"));
    // 只有启动时的预取。
    token_mock.assert_calls_async(1).await;
    chat_mock.assert_calls_async(0).await;

    manager.shutdown().await;
}

#[tokio::test]
async fn single_worker_never_exceeds_its_rate() {
    let server = MockServer::start_async().await;
    let token_mock = mock_token(&server).await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).body(OK_BODY);
        })
        .await;
    let manager = Manager::start(&config_for(&server, &[("a", 2)], "")).await.unwrap();

    let started = Instant::now();
    let pool = &manager;
    let timed = (0..5).map(move |i| {
        async move {
            let got = pool.request(&format!("m{i}"), "echo").await;

            (got, started.elapsed())
        }
    });
    let results = futures::future::join_all(timed).await;

    assert!(results.iter().all(|(got, _)| got.is_success()));

    let early = results.iter().filter(|(_, at)| *at < Duration::from_secs(1)).count();

    assert_eq!(early, 2);
    assert_eq!(results.len() - early, 3);
    chat_mock.assert_calls_async(5).await;
    token_mock.assert_calls_async(1).await;

    manager.shutdown().await;
}

#[tokio::test]
async fn workers_share_one_queue() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).body(OK_BODY);
        })
        .await;
    let manager =
        Manager::start(&config_for(&server, &[("a", 1), ("b", 1)], "")).await.unwrap();

    let started = Instant::now();
    let (x, y) = tokio::join!(manager.request("x", "echo"), manager.request("y", "echo"));

    assert!(x.is_success() && y.is_success());
    // 两个 worker 各 1 次/秒，两条请求都不需要等下一秒。
    assert!(started.elapsed() < Duration::from_secs(1));
    chat_mock.assert_calls_async(2).await;

    manager.shutdown().await;
}

#[tokio::test]
async fn slow_provider_times_out_and_late_result_is_harmless() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).delay(Duration::from_millis(600)).body(OK_BODY);
        })
        .await;
    let cfg = config_for(&server, &[("a", 2)], "request_timeout_ms = 200");
    let manager = Manager::start(&cfg).await.unwrap();

    let started = Instant::now();
    let got = manager.request("slow", "echo").await;

    assert_eq!(got, LlmResponse::timeout());
    assert!(started.elapsed() < Duration::from_millis(600));

    // 迟到的响应被丢弃，池仍然可用。
    tokio::time::sleep(Duration::from_millis(700)).await;
    chat_mock.assert_calls_async(1).await;
    assert_eq!(manager.outstanding(), 0);

    manager.shutdown().await;
}

#[tokio::test]
async fn reply_without_result_is_a_failure() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).body(r#"{"error_code":18,"error_msg":"Open api qps request limit reached"}"#);
        })
        .await;
    let manager = Manager::start(&config_for(&server, &[("a", 2)], "")).await.unwrap();

    let got = manager.request("hi", "echo").await;

    assert!(!got.is_success());
    assert!(got.error().is_some_and(|e| e.contains("qps request limit")));

    manager.shutdown().await;
}

#[tokio::test]
async fn requests_after_shutdown_fail_fast() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/chat");
            then.status(200).body(OK_BODY);
        })
        .await;
    let manager = Manager::start(&config_for(&server, &[("a", 2)], "")).await.unwrap();

    manager.shutdown().await;

    let got = manager.request("late", "echo").await;

    assert_eq!(got.error(), Some("PoolShutdown"));
    assert_eq!(manager.outstanding(), 0);
    chat_mock.assert_calls_async(0).await;
    // 重复关闭无副作用。
    manager.shutdown().await;
}
