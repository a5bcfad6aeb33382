use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn curb_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("curb");
    path
}

const TRUCKS_CSV: &str = "\
locationid,Applicant,FoodItems,Status,Address,LocationDescription
101,Bob's Burgers,Burgers: melts: fries,APPROVED,1 Market St,NE corner
102,bob's burgers,Burgers: shakes,APPROVED,2 Mission St,SW corner
103,Taco Cart,Tacos: : ThisTokenIsDefinitelyLongerThanThirtyTwoCharacters:Burritos,APPROVED,3 Valencia St,
";

const SCHEDULES_CSV: &str = "\
Applicant,locationid,DayOrder,DayOfWeekStr,start24,end24
Bob's Burgers,101,1,Monday,10:00,14:00
Bob's Burgers,101,2,Tuesday,10:00,14:00
Taco Cart,103,1,Monday,11:00,15:00
";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let feeds_dir = root.join("feeds");
    fs::create_dir_all(&feeds_dir).unwrap();
    fs::write(feeds_dir.join("trucks.csv"), TRUCKS_CSV).unwrap();
    fs::write(feeds_dir.join("schedules.csv"), SCHEDULES_CSV).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/curbfare.sqlite"

[sources]
trucks = "{root}/feeds/trucks.csv"
schedules = "{root}/feeds/schedules.csv"

[server]
bind = "127.0.0.1:7343"
"#,
        root = root.display()
    );

    let config_path = root.join("curbfare.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_curb(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = curb_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run curb binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_curb(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_curb(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_curb(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_import_from_local_feeds() {
    let (_tmp, config_path) = setup_test_env();

    run_curb(&config_path, &["init"]);
    let (stdout, stderr, success) = run_curb(&config_path, &["import"]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);

    assert!(stdout.contains("locations upserted: 3"));
    // Bob's Burgers appears twice with different case: 3 records, 3 truck
    // upserts, but only 2 identities (visible via stats below)
    assert!(stdout.contains("trucks upserted: 3"));
    assert!(stdout.contains("schedules upserted: 3"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_import_idempotent_no_duplicates() {
    let (_tmp, config_path) = setup_test_env();

    run_curb(&config_path, &["init"]);
    run_curb(&config_path, &["import"]);
    let (stats1, _, _) = run_curb(&config_path, &["stats"]);

    run_curb(&config_path, &["import"]);
    let (stats2, _, _) = run_curb(&config_path, &["stats"]);

    // Strip the size line; WAL checkpointing can change the file size
    let strip = |s: &str| {
        s.lines()
            .filter(|l| !l.contains("Size:"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(
        strip(&stats1),
        strip(&stats2),
        "row counts changed on re-import"
    );
}

#[test]
fn test_stats_reports_deduped_identities() {
    let (_tmp, config_path) = setup_test_env();

    run_curb(&config_path, &["init"]);
    run_curb(&config_path, &["import"]);

    let (stdout, _, success) = run_curb(&config_path, &["stats"]);
    assert!(success);
    // 2 trucks: the case-variant "bob's burgers" resolves to one identity
    assert!(stdout.contains("Trucks:          2"), "stats: {}", stdout);
    assert!(stdout.contains("Locations:       3"), "stats: {}", stdout);
    // 6 foods: Burgers, melts, fries, shakes, Tacos, Burritos (the empty and
    // overlong tokens are dropped)
    assert!(stdout.contains("Foods:           6"), "stats: {}", stdout);
}

#[test]
fn test_embed_requires_provider() {
    let (_tmp, config_path) = setup_test_env();

    run_curb(&config_path, &["init"]);
    let (stdout, stderr, success) = run_curb(&config_path, &["embed", "pending"]);
    assert!(!success, "embed should fail without a provider: {}", stdout);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_ask_requires_provider() {
    let (_tmp, config_path) = setup_test_env();

    run_curb(&config_path, &["init"]);
    run_curb(&config_path, &["import"]);
    let (_, stderr, success) = run_curb(&config_path, &["ask", "tacos"]);
    assert!(!success, "ask should fail without a provider");
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_import_aborts_on_malformed_record() {
    let (tmp, config_path) = setup_test_env();

    // Corrupt the trucks feed with a non-numeric location id
    let feeds_dir = tmp.path().join("feeds");
    fs::write(
        feeds_dir.join("trucks.csv"),
        "locationid,Applicant,FoodItems,Status,Address,LocationDescription\n\
         oops,Bad Truck,Tacos,APPROVED,1 Market St,\n",
    )
    .unwrap();

    run_curb(&config_path, &["init"]);
    let (_, stderr, success) = run_curb(&config_path, &["import"]);
    assert!(!success, "import should abort on a malformed record");
    assert!(stderr.contains("oops"), "stderr: {}", stderr);
}
