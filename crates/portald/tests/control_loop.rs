use portal_client::{PortalSession, SessionConfig, TransportOptions};
use portal_lifecycle::ShutdownToken;
use portal_retry::RetryPolicy;
use portald::{ControlLoop, CycleOutcome, LoopConfig, LoopState, OnlineDetector, ShutdownOutcome};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_INFO: &str = "/cgi-bin/rad_user_info";
const CHALLENGE: &str = "/cgi-bin/get_challenge";
const PORTAL: &str = "/cgi-bin/srun_portal";

fn loop_config(loop_interval: Duration, logout_on_exit: bool) -> LoopConfig {
    LoopConfig {
        control_retry: RetryPolicy::new(3, Duration::from_millis(5)),
        loop_interval,
        settle_delay: Duration::ZERO,
        logout_on_exit,
        logout_deadline: Duration::from_secs(5),
    }
}

fn control(server: &MockServer, config: LoopConfig) -> ControlLoop {
    let session = PortalSession::new(SessionConfig {
        scheme: "http".into(),
        server: server.address().to_string(),
        username: "alice".into(),
        transport: TransportOptions {
            timeout: Duration::from_secs(2),
            ..TransportOptions::default()
        },
        network_retry: RetryPolicy::once(),
    });
    ControlLoop::new(session, "hunter2", OnlineDetector::AuthServer, config)
}

fn jsonp(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!("jQuery({body})"))
}

async fn requests_to(server: &MockServer, endpoint: &str, action: Option<&str>) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|req| req.url.path() == endpoint)
        .filter(|req| match action {
            Some(action) => req
                .url
                .query_pairs()
                .any(|(k, v)| k == "action" && v == action),
            None => true,
        })
        .count()
}

// Scenario A
#[tokio::test]
async fn online_host_is_left_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USER_INFO))
        .respond_with(jsonp(r#"{"error":"ok","online_ip":"10.0.0.5"}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CHALLENGE))
        .respond_with(jsonp(r#"{"challenge":"abc123"}"#))
        .expect(0)
        .mount(&server)
        .await;

    let control = control(&server, loop_config(Duration::from_secs(60), false));
    let outcome = control.run_cycle(&ShutdownToken::new()).await;

    assert_eq!(outcome, CycleOutcome::AlreadyOnline);
    assert_eq!(control.state(), LoopState::Online);
}

// Scenario B
#[tokio::test]
async fn offline_host_logs_in_with_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USER_INFO))
        .respond_with(jsonp(r#"{"error":"not_online_error","online_ip":"10.0.0.5"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CHALLENGE))
        .and(query_param("username", "alice"))
        .and(query_param("ip", "10.0.0.5"))
        .respond_with(jsonp(r#"{"challenge":"abc123","error":"ok"}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PORTAL))
        .and(query_param("action", "login"))
        .respond_with(jsonp(r#"{"error":"ok"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let control = control(&server, loop_config(Duration::from_secs(60), false));
    let outcome = control.run_cycle(&ShutdownToken::new()).await;

    assert_eq!(outcome, CycleOutcome::LoggedIn);
    // three detection attempts, then the post-login check
    assert_eq!(requests_to(&server, USER_INFO, None).await, 4);
}

// Scenario C
#[tokio::test]
async fn rejected_logins_exhaust_and_next_cycle_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USER_INFO))
        .respond_with(jsonp(r#"{"error":"not_online_error","online_ip":"10.0.0.5"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CHALLENGE))
        .respond_with(jsonp(r#"{"challenge":"abc123","error":"ok"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PORTAL))
        .and(query_param("action", "login"))
        .respond_with(jsonp(r#"{"error":"E2901: Already online"}"#))
        .mount(&server)
        .await;

    let control = control(&server, loop_config(Duration::from_millis(50), false));
    let token = ShutdownToken::new();

    let outcome = control.run_cycle(&token).await;
    assert_eq!(outcome, CycleOutcome::LoginFailed { attempts: 3 });
    assert_eq!(requests_to(&server, PORTAL, Some("login")).await, 3);

    // the loop keeps going after exhaustion
    let canceller = token.clone();
    let observer = async {
        for _ in 0..200 {
            if requests_to(&server, PORTAL, Some("login")).await >= 9 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        canceller.cancel();
    };
    tokio::join!(control.run(&token), observer);

    assert!(requests_to(&server, PORTAL, Some("login")).await >= 9);
}

// Scenario D
#[tokio::test]
async fn shutdown_while_idle_logs_out_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USER_INFO))
        .respond_with(jsonp(r#"{"error":"ok","online_ip":"10.0.0.5"}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PORTAL))
        .and(query_param("action", "logout"))
        .and(query_param("username", "alice"))
        .and(query_param("ac_id", "1"))
        .respond_with(jsonp(r#"{"error":"ok"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let control = control(&server, loop_config(Duration::from_secs(60), true));
    let token = ShutdownToken::new();

    let canceller = token.clone();
    let signal = async {
        // wait until the first cycle is done and the loop sleeps
        for _ in 0..200 {
            if control.state() == LoopState::Idle
                && requests_to(&server, USER_INFO, None).await == 1
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        canceller.cancel();
    };
    let (outcome, _) = tokio::join!(control.run_until_shutdown(&token), signal);

    assert_eq!(outcome, ShutdownOutcome::LoggedOut);
    assert_eq!(control.state(), LoopState::ShuttingDown);
    assert_eq!(requests_to(&server, USER_INFO, None).await, 1);
}

#[tokio::test]
async fn shutdown_logout_is_retried_then_gives_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PORTAL))
        .and(query_param("action", "logout"))
        .respond_with(jsonp(r#"{"error":"logout_error"}"#))
        .expect(3)
        .mount(&server)
        .await;

    let control = control(&server, loop_config(Duration::from_secs(60), true));
    assert_eq!(control.shutdown().await, ShutdownOutcome::LogoutFailed);
}

#[tokio::test]
async fn shutdown_logout_is_bounded_by_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PORTAL))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = loop_config(Duration::from_secs(60), true);
    config.control_retry = RetryPolicy::new(100, Duration::from_secs(30));
    config.logout_deadline = Duration::from_millis(100);
    let control = control(&server, config);

    let started = std::time::Instant::now();
    assert_eq!(control.shutdown().await, ShutdownOutcome::LogoutFailed);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn no_logout_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PORTAL))
        .respond_with(jsonp(r#"{"error":"ok"}"#))
        .expect(0)
        .mount(&server)
        .await;

    let control = control(&server, loop_config(Duration::from_secs(60), false));
    let token = ShutdownToken::new();
    token.cancel();
    assert_eq!(
        control.run_until_shutdown(&token).await,
        ShutdownOutcome::Skipped
    );
}

#[tokio::test]
async fn cancellation_during_detection_wait_stops_promptly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USER_INFO))
        .respond_with(jsonp(r#"{"error":"not_online_error","online_ip":"10.0.0.5"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CHALLENGE))
        .respond_with(jsonp(r#"{"challenge":"abc123"}"#))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = loop_config(Duration::from_secs(60), false);
    config.control_retry = RetryPolicy::new(3, Duration::from_secs(60));
    let control = control(&server, config);
    let token = ShutdownToken::new();

    let canceller = token.clone();
    let signal = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    };
    let started = std::time::Instant::now();
    let (outcome, _) = tokio::join!(control.run_cycle(&token), signal);

    assert_eq!(outcome, CycleOutcome::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancellation_during_network_wait_is_reported_as_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USER_INFO))
        .respond_with(jsonp(r#"{"error":"not_online_error","online_ip":"10.0.0.5"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CHALLENGE))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let session = PortalSession::new(SessionConfig {
        scheme: "http".into(),
        server: server.address().to_string(),
        username: "alice".into(),
        transport: TransportOptions {
            timeout: Duration::from_secs(2),
            ..TransportOptions::default()
        },
        network_retry: RetryPolicy::new(4, Duration::from_secs(60)),
    });
    let mut config = loop_config(Duration::from_secs(60), false);
    config.control_retry = RetryPolicy::once();
    let control = ControlLoop::new(session, "hunter2", OnlineDetector::AuthServer, config);
    let token = ShutdownToken::new();

    let canceller = token.clone();
    let signal = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    };
    let started = std::time::Instant::now();
    let (result, _) = tokio::join!(control.login_once(&token), signal);

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn whoami_reports_client_ip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USER_INFO))
        .respond_with(jsonp(r#"{"error":"not_online_error","client_ip":"10.0.0.42"}"#))
        .mount(&server)
        .await;

    let control = control(&server, loop_config(Duration::from_secs(60), false));
    let info = control.whoami(&ShutdownToken::new()).await.unwrap();
    assert_eq!(info.client_ip.as_deref(), Some("10.0.0.42"));
    assert!(!info.logged_in);
}

#[tokio::test]
async fn forced_login_skips_detection_when_ip_known() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(USER_INFO))
        .respond_with(jsonp(r#"{"error":"ok","online_ip":"10.0.0.5"}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CHALLENGE))
        .respond_with(jsonp(r#"{"challenge":"abc123"}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PORTAL))
        .and(query_param("action", "login"))
        .respond_with(jsonp(r#"{"error":"ok"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let control = control(&server, loop_config(Duration::from_secs(60), false));
    // an online host still logs in: the address lookup is the only user-info call
    control.login_once(&ShutdownToken::new()).await.unwrap();
    assert_eq!(control.state(), LoopState::Idle);
}

#[tokio::test]
async fn logout_once_reports_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PORTAL))
        .respond_with(jsonp(r#"{"error":"logout_error"}"#))
        .mount(&server)
        .await;

    let control = control(&server, loop_config(Duration::from_secs(60), false));
    let err = control.logout_once(&ShutdownToken::new()).await.unwrap_err();
    assert_eq!(err.errors().len(), 3);
    assert!(err.summary().contains("logout_error"));
}
