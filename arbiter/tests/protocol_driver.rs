//! Integration test for `protocol::Driver` against a real scripted
//! subprocess transport (a tiny `/bin/sh` "engine"), exercising the
//! handshake, option discovery, and search round trip together rather
//! than as isolated unit tests of `parse_option_line`/`parse_info_line`.

use arbiter::protocol::{BestMoveOutcome, Driver};
use arbiter::transport::EngineProcess;
use std::time::{Duration, Instant};

const SCRIPTED_ENGINE: &str = r#"
while read -r line; do
  case "$line" in
    uci)
      echo "id name ScriptedEngine"
      echo "id author test"
      echo "option name Hash type spin default 16 min 1 max 1024"
      echo "option name Ponder type check default false"
      echo "uciok"
      ;;
    isready) echo "readyok" ;;
    go*)
      echo "info depth 4 seldepth 6 nodes 1000 time 12 score cp 37 pv e2e4 e7e5"
      echo "bestmove e2e4 ponder e7e5"
      ;;
  esac
done
"#;

fn spawn() -> Driver {
    let log = std::env::temp_dir().join("arbiter_protocol_driver_test.stderr");
    let process = EngineProcess::spawn(
        "scripted",
        "/bin/sh",
        &["-c".to_string(), SCRIPTED_ENGINE.to_string()],
        None,
        &log,
    )
    .expect("spawn /bin/sh");
    Driver::new(process, arbiter::data::Protocol::Uci)
}

#[test]
fn handshake_collects_identity_and_options() {
    let mut driver = spawn();
    driver.handshake().expect("handshake");
    assert_eq!(driver.id_name.as_deref(), Some("ScriptedEngine"));
    assert_eq!(driver.id_author.as_deref(), Some("test"));
    assert_eq!(driver.options.len(), 2);
    driver.quit();
}

#[test]
fn is_ready_and_go_round_trip_produces_bestmove_with_info() {
    let mut driver = spawn();
    driver.handshake().expect("handshake");
    assert!(driver.is_ready(Duration::from_secs(2)).unwrap());

    let go_cmd = driver.build_go(
        Some(Duration::from_secs(60)),
        Some(Duration::from_secs(60)),
        Duration::ZERO,
        Duration::ZERO,
        None,
        None,
        None,
        None,
    );
    driver.go(&go_cmd).expect("send go");
    let deadline = Instant::now() + Duration::from_secs(2);
    match driver.wait_for_best_move(deadline).expect("wait for bestmove") {
        BestMoveOutcome::Move { mov, ponder, last_info } => {
            assert_eq!(mov, "e2e4");
            assert_eq!(ponder.as_deref(), Some("e7e5"));
            assert_eq!(last_info.depth, Some(4));
            assert_eq!(last_info.score_cp, Some(37));
            assert_eq!(last_info.pv, vec!["e2e4", "e7e5"]);
        }
        other => panic!("expected a move, got {other:?}"),
    }
    driver.quit();
}

#[test]
fn timeout_is_reported_without_an_error_when_engine_never_replies() {
    let log = std::env::temp_dir().join("arbiter_protocol_driver_silent.stderr");
    let silent = "while read -r line; do :; done";
    let process = EngineProcess::spawn("silent", "/bin/sh", &["-c".to_string(), silent.to_string()], None, &log)
        .expect("spawn /bin/sh");
    let mut driver = Driver::new(process, arbiter::data::Protocol::Uci);
    let deadline = Instant::now() + Duration::from_millis(200);
    match driver.wait_for_best_move(deadline).expect("wait_for_best_move returns Ok on timeout") {
        BestMoveOutcome::Timeout => {}
        other => panic!("expected timeout, got {other:?}"),
    }
    driver.quit();
}
