//! Integration tests for virtdb

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct Workspace {
        temp: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let ws = Self {
                temp: TempDir::new().unwrap(),
            };
            ws.package("util", "ed", "1.0", r#"provides = "virtual/editor""#);
            ws.package("util", "vi", "1.0", r#"provides = "virtual/editor""#);
            ws.package(
                "app",
                "less",
                "2.1",
                r#"provides = "virtual/pager !minimal? ( virtual/man )""#,
            );
            ws
        }

        fn repo(&self) -> PathBuf {
            self.temp.path().join("repo")
        }

        fn cache_dir(&self) -> PathBuf {
            self.temp.path().join("cache")
        }

        fn config(&self) -> PathBuf {
            self.temp.path().join("config.toml")
        }

        fn package(&self, category: &str, name: &str, version: &str, body: &str) {
            let dir = self.repo().join(category).join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{}-{}.toml", name, version)), body).unwrap();
        }

        fn virtdb(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("virtdb");
            cmd.env("VIRTDB_CONFIG", self.config())
                .env_remove("VIRTDB_REPO")
                .env("NO_COLOR", "1");
            cmd
        }

        fn resolve(&self) -> Command {
            let mut cmd = self.virtdb();
            cmd.arg("resolve")
                .arg("--repo")
                .arg(self.repo())
                .arg("--cache-dir")
                .arg(self.cache_dir());
            cmd
        }
    }

    fn path_str(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("virtdb")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("virtual package provider cache"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("virtdb")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("virtdb"));
    }

    #[test]
    fn config_path_honours_env() {
        let ws = Workspace::new();
        ws.virtdb()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains(path_str(&ws.config())));
    }

    #[test]
    fn config_init_then_refuse() {
        let ws = Workspace::new();
        ws.virtdb().args(["config", "init"]).assert().success();
        assert!(ws.config().exists());

        ws.virtdb()
            .args(["config", "init"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--force"));

        ws.virtdb()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn resolve_without_repo_fails() {
        let ws = Workspace::new();
        ws.virtdb()
            .arg("resolve")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No repository configured"));
    }

    #[test]
    fn resolve_table() {
        let ws = Workspace::new();
        ws.resolve()
            .assert()
            .success()
            .stdout(predicate::str::contains("editor"))
            .stdout(predicate::str::contains("|| ( =util/ed-1.0 =util/vi-1.0 )"))
            .stdout(predicate::str::contains("=app/less-2.1"));

        assert!(ws.cache_dir().join("virtuals.cache").exists());
    }

    #[test]
    fn resolve_json_filters_virtuals() {
        let ws = Workspace::new();
        let output = ws
            .resolve()
            .args(["--format", "json", "virtual/pager"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(json["pager"]["2.1"], "=app/less-2.1");
        assert!(json.get("editor").is_none());
    }

    #[test]
    fn resolve_json_any_of_is_a_list() {
        let ws = Workspace::new();
        let output = ws
            .resolve()
            .args(["--format", "json", "editor"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(
            json["editor"]["1.0"],
            serde_json::json!(["=util/ed-1.0", "=util/vi-1.0"])
        );
    }

    #[test]
    fn resolve_plain() {
        let ws = Workspace::new();
        ws.resolve()
            .args(["--format", "plain", "man"])
            .assert()
            .success()
            .stdout("man\t2.1\t=app/less-2.1\n");
    }

    #[test]
    fn unknown_virtual_fails() {
        let ws = Workspace::new();
        ws.resolve()
            .arg("browser")
            .assert()
            .failure()
            .stderr(predicate::str::contains("browser"));
    }

    #[test]
    fn no_cache_leaves_no_cache_file() {
        let ws = Workspace::new();
        ws.resolve()
            .arg("--no-cache")
            .assert()
            .success()
            .stdout(predicate::str::contains("editor"));

        assert!(!ws.cache_dir().join("virtuals.cache").exists());
    }

    #[test]
    fn second_run_uses_cache() {
        let ws = Workspace::new();
        ws.resolve().assert().success();

        ws.resolve()
            .arg("-v")
            .assert()
            .success()
            .stderr(predicate::str::contains("Cache current"));
    }

    #[test]
    fn cache_status_and_clear() {
        let ws = Workspace::new();
        ws.resolve().assert().success();

        ws.virtdb()
            .args(["cache", "status", "--repo"])
            .arg(ws.repo())
            .arg("--cache-dir")
            .arg(ws.cache_dir())
            .assert()
            .success()
            .stdout(predicate::str::contains("util"))
            .stdout(predicate::str::contains("valid"));

        ws.virtdb()
            .args(["cache", "clear", "--cache-dir"])
            .arg(ws.cache_dir())
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed"));
        assert!(!ws.cache_dir().join("virtuals.cache").exists());

        ws.virtdb()
            .args(["cache", "clear", "--cache-dir"])
            .arg(ws.cache_dir())
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache to clear"));
    }

    #[test]
    fn unknown_cache_group_still_caches() {
        let ws = Workspace::new();
        fs::write(ws.config(), "[cache]\ngroup = \"virtdb-no-such-group\"\n").unwrap();

        ws.resolve()
            .args(["--format", "plain", "pager"])
            .assert()
            .success()
            .stdout("pager\t2.1\t=app/less-2.1\n");

        assert!(ws.cache_dir().join("virtuals.cache").exists());
    }

    #[test]
    fn corrupted_cache_is_repaired() {
        let ws = Workspace::new();
        fs::create_dir_all(ws.cache_dir()).unwrap();
        fs::write(
            ws.cache_dir().join("virtuals.cache"),
            "util\tnot-a-number\n.\t1\n",
        )
        .unwrap();

        ws.resolve()
            .args(["--format", "plain", "editor"])
            .assert()
            .success()
            .stdout(predicate::str::contains("=util/ed-1.0"));

        let text = fs::read_to_string(ws.cache_dir().join("virtuals.cache")).unwrap();
        assert!(text.contains("=util/vi-1.0"));
    }
}
