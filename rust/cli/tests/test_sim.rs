use cardtable_cli::run;
use serde_json::Value;
use std::fs;

fn events(text: &str) -> Vec<Value> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("valid JSON line"))
        .collect()
}

fn final_standings(events: &[Value]) -> Vec<Value> {
    events
        .iter()
        .filter(|e| e["event"] == "session_ended")
        .map(|e| e["summary"]["standings"].clone())
        .collect()
}

#[test]
fn sim_writes_jsonl_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs").join("tp.jsonl");
    let path_str = path.to_string_lossy().into_owned();
    let mut out: Vec<u8> = Vec::new();
    let mut err: Vec<u8> = Vec::new();
    let code = run(
        [
            "cardtable", "sim", "--sessions", "2", "--rounds", "3", "--players", "3", "--seed",
            "42", "--output", path_str.as_str(),
        ],
        &mut out,
        &mut err,
    );
    assert_eq!(code, 0, "stderr={}", String::from_utf8_lossy(&err));
    let stdout = String::from_utf8(out).unwrap();
    assert!(stdout.starts_with("Simulated: 2 sessions, 6 rounds"), "{}", stdout);

    let evs = events(&fs::read_to_string(&path).unwrap());
    let ended = evs.iter().filter(|e| e["event"] == "session_ended").count();
    let hands = evs.iter().filter(|e| e["event"] == "hand_complete").count();
    assert_eq!(ended, 2);
    assert_eq!(hands, 6);
    for standings in final_standings(&evs) {
        let total: i64 = standings
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["balance"].as_i64().unwrap())
            .sum();
        assert_eq!(total, 0, "chips are conserved");
    }
}

#[test]
fn sim_streams_to_stdout_without_output() {
    let mut out: Vec<u8> = Vec::new();
    let mut err: Vec<u8> = Vec::new();
    let code = run(
        ["cardtable", "sim", "--game", "rummy", "--rounds", "2", "--seed", "9"],
        &mut out,
        &mut err,
    );
    assert_eq!(code, 0, "stderr={}", String::from_utf8_lossy(&err));
    let evs = events(&String::from_utf8(out).unwrap());
    assert_eq!(evs.first().unwrap()["event"], "state_change");
    let ended = evs.iter().filter(|e| e["event"] == "session_ended").count();
    assert_eq!(ended, 1);
    let rounds = evs.iter().filter(|e| e["event"] == "round_complete").count();
    assert_eq!(rounds, 2);
    assert!(String::from_utf8(err).unwrap().contains("Simulated: 1 sessions"));
}

#[test]
fn seeded_sims_agree_on_results() {
    let run_once = || {
        let mut out: Vec<u8> = Vec::new();
        let mut err: Vec<u8> = Vec::new();
        let code = run(
            ["cardtable", "sim", "--game", "rummy", "--players", "3", "--rounds", "2", "--seed", "77"],
            &mut out,
            &mut err,
        );
        assert_eq!(code, 0);
        final_standings(&events(&String::from_utf8(out).unwrap()))
    };
    let a = run_once();
    assert_eq!(a.len(), 1);
    assert_eq!(a, run_once());
}

#[test]
fn sim_appends_to_an_existing_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.jsonl");
    let path_str = path.to_string_lossy().into_owned();
    let sim = |seed: &str| {
        let mut out: Vec<u8> = Vec::new();
        let mut err: Vec<u8> = Vec::new();
        run(
            ["cardtable", "sim", "--rounds", "1", "--seed", seed, "--output", path_str.as_str()],
            &mut out,
            &mut err,
        )
    };
    assert_eq!(sim("1"), 0);
    let first = events(&fs::read_to_string(&path).unwrap()).len();
    assert_eq!(sim("2"), 0);
    let all = events(&fs::read_to_string(&path).unwrap());
    assert!(all.len() > first);
    assert_eq!(
        all.iter().filter(|e| e["event"] == "session_ended").count(),
        2
    );
}
