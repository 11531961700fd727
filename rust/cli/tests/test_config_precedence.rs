use cardtable_cli::run;
use serde_json::Value;
use serial_test::serial;
use std::io::Write;

const VARS: &[&str] = &[
    "CARDTABLE_CONFIG",
    "CARDTABLE_GAME",
    "CARDTABLE_SEED",
    "CARDTABLE_ROUNDS",
    "CARDTABLE_PLAYERS",
];

fn clear_env() {
    for v in VARS {
        unsafe {
            std::env::remove_var(v);
        }
    }
}

fn set_env(key: &str, value: &str) {
    unsafe {
        std::env::set_var(key, value);
    }
}

fn cfg() -> (i32, String, String) {
    let mut out: Vec<u8> = Vec::new();
    let mut err: Vec<u8> = Vec::new();
    let code = run(["cardtable", "cfg"], &mut out, &mut err);
    (
        code,
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

#[test]
#[serial]
fn cfg_reports_defaults() {
    clear_env();
    let (code, out, err) = cfg();
    assert_eq!(code, 0, "stderr={}", err);
    assert!(err.is_empty());
    let json: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["game"]["value"], "teen_patti");
    assert_eq!(json["rounds"]["value"], 5);
    assert_eq!(json["players"]["value"], 3);
    assert!(json["seed"]["value"].is_null());
    for key in ["game", "seed", "rounds", "players"] {
        assert_eq!(json[key]["source"], "default", "{}", key);
    }
}

#[test]
#[serial]
fn env_overrides_file() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "game = \"rummy\"\nseed = 11\nrounds = 2\nplayers = 4").unwrap();
    set_env("CARDTABLE_CONFIG", file.path().to_str().unwrap());
    set_env("CARDTABLE_SEED", "99");

    let (code, out, err) = cfg();
    clear_env();
    assert_eq!(code, 0, "stderr={}", err);
    let json: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["game"]["value"], "rummy");
    assert_eq!(json["game"]["source"], "file");
    assert_eq!(json["seed"]["value"], 99);
    assert_eq!(json["seed"]["source"], "env");
    assert_eq!(json["rounds"]["value"], 2);
    assert_eq!(json["players"]["source"], "file");
}

#[test]
#[serial]
fn flags_override_env() {
    clear_env();
    set_env("CARDTABLE_SEED", "5");
    set_env("CARDTABLE_PLAYERS", "2");
    let run_deal = |args: &[&str]| {
        let mut out: Vec<u8> = Vec::new();
        let mut err: Vec<u8> = Vec::new();
        let mut argv = vec!["cardtable", "deal"];
        argv.extend_from_slice(args);
        assert_eq!(run(argv, &mut out, &mut err), 0);
        String::from_utf8(out).unwrap()
    };
    let from_env = run_deal(&[]);
    let from_flag = run_deal(&["--seed", "6", "--players", "3"]);
    clear_env();

    assert!(from_env.contains("Seed: 5"));
    assert!(from_env.contains("P2: ") && !from_env.contains("P3: "));
    assert!(from_flag.contains("Seed: 6"));
    assert!(from_flag.contains("P3: "));
}

#[test]
#[serial]
fn invalid_env_value_fails_cfg() {
    clear_env();
    set_env("CARDTABLE_ROUNDS", "many");
    let (code, out, err) = cfg();
    clear_env();
    assert_eq!(code, 2);
    assert!(out.is_empty());
    assert!(err.contains("Invalid configuration: Invalid rounds"), "{}", err);
}

#[test]
#[serial]
fn unreadable_config_file_is_reported() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    set_env("CARDTABLE_CONFIG", missing.to_str().unwrap());
    let (code, _, err) = cfg();
    clear_env();
    assert_eq!(code, 2);
    assert!(err.contains("cannot read config file"), "{}", err);
}
