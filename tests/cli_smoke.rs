use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

use qasearch::SnapshotDb;
use serde_json::{Value, json};

const CORPUS: &str = r#"[
    {
        "id": "grid",
        "question": "Как включить сетку?",
        "answer": "Нажмите <b>G</b> в окне проекции.",
        "media": ["media/grid.png"],
        "embedding": [0.0, 0.0, 1.0]
    },
    {
        "id": "save",
        "question": "How do I save a project?",
        "answer": "Use File &gt; Save or press Ctrl+S.",
        "links": ["https://help.autodesk.com/save"],
        "embedding": [3.0, 0.0, 0.0]
    },
    {
        "id": "camera",
        "question": "How do I animate a camera?",
        "answer": "Set keys on the camera position.",
        "embedding": [0.0, 30.0, 0.0]
    }
]"#;

struct Fixture {
    _tmp: tempfile::TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        std::fs::write(root.join("qa.json"), CORPUS).unwrap();
        Self { _tmp: tmp, root }
    }

    fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_qasearch"))
            .arg("--data-dir")
            .arg(self.data_dir())
            .args(args)
            .env_remove("QASEARCH_LOG")
            .output()
            .unwrap()
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "qasearch {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn build(&self) -> String {
        let corpus = self.root.join("qa.json");
        self.run_ok(&["build", "--corpus", corpus.to_str().unwrap()])
    }

    fn embedding(&self, name: &str, vector: &[f32]) -> PathBuf {
        let path = self.root.join(name);
        std::fs::write(&path, json!(vector).to_string()).unwrap();
        path
    }
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn build_then_query_direct_answer() {
    let fx = Fixture::new();
    let built = fx.build();
    assert!(built.contains("3 documents"), "{built}");
    assert!(built.contains("dimension 3"), "{built}");

    let query = fx.embedding("q.json", &[0.0, 0.0, 1.0]);
    let out = fx.run_ok(&[
        "query",
        "где сетка?",
        "--embedding",
        path_arg(&query),
        "--json",
    ]);
    let answer: Value = serde_json::from_str(&out).unwrap();

    assert_eq!(answer["tier"], "direct");
    let best = &answer["candidates"][0];
    assert_eq!(best["rank"], 1);
    assert_eq!(best["metadata"]["question"], "Как включить сетку?");
    assert_eq!(best["metadata"]["media"][0], "media/grid.png");
    assert_eq!(best["confidence_percent"], 100);
    assert_eq!(best["origin"], "vector");
}

#[test]
fn human_output_hedges_tentative_answers() {
    let fx = Fixture::new();
    fx.build();

    // Squared distance 7.84 from the "save" record: similarity about 0.46.
    // Raising the cutoff makes that tentative.
    fx.run_ok(&["config", "set", "direct_cutoff", "0.9"]);
    let query = fx.embedding("q.json", &[3.0, 2.8, 0.0]);
    let out = fx.run_ok(&[
        "query",
        "camera keys",
        "--embedding",
        path_arg(&query),
        "-n",
        "1",
    ]);

    assert!(out.starts_with("Perhaps you meant:"), "{out}");
    assert!(out.contains("Question: How do I save a project?"), "{out}");
    assert!(out.contains("Relevance: 45%"), "{out}");
}

#[test]
fn distant_query_reports_no_match() {
    let fx = Fixture::new();
    fx.build();

    let query = fx.embedding("q.json", &[100.0, 100.0, 100.0]);
    let out = fx.run_ok(&[
        "query",
        "weather",
        "--embedding",
        path_arg(&query),
        "--json",
    ]);
    let answer: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(answer["tier"], "no_match");
    assert_eq!(answer["candidates"], json!([]));
}

#[test]
fn query_without_snapshot_fails() {
    let fx = Fixture::new();
    let query = fx.embedding("q.json", &[0.0, 0.0, 1.0]);
    let output = fx.run(&["query", "grid", "--embedding", path_arg(&query)]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Snapshot"), "{stderr}");
    assert!(stderr.contains("qasearch build"), "{stderr}");
    assert!(!fx.data_dir().join("snapshot.redb").exists());
}

#[test]
fn query_with_wrong_dimension_fails() {
    let fx = Fixture::new();
    fx.build();

    let query = fx.embedding("q.json", &[0.0, 1.0]);
    let output = fx.run(&["query", "grid", "--embedding", path_arg(&query)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DimensionMismatch"), "{stderr}");
}

#[test]
fn build_persists_a_loadable_snapshot() {
    let fx = Fixture::new();
    fx.build();

    let db = SnapshotDb::open(&fx.data_dir().join("snapshot.redb")).unwrap();
    let snapshot = db.read().unwrap();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(
        snapshot.store().get(1).unwrap().text,
        "Question: How do I save a project? Answer: Use File > Save or press Ctrl+S."
    );
    assert_eq!(snapshot.keywords().postings("save"), Some(&[1][..]));
    assert_eq!(snapshot.keywords().postings("сетка"), Some(&[][..]));
}

#[test]
fn build_with_custom_vocabulary() {
    let fx = Fixture::new();
    let vocabulary = fx.root.join("terms.txt");
    std::fs::write(&vocabulary, "# custom\ncamera\nсетк\n").unwrap();
    let corpus = fx.root.join("qa.json");
    let out = fx.run_ok(&[
        "build",
        "--corpus",
        path_arg(&corpus),
        "--vocabulary",
        path_arg(&vocabulary),
    ]);
    assert!(out.contains("2 keyword terms"), "{out}");

    let snapshot = SnapshotDb::open(&fx.data_dir().join("snapshot.redb"))
        .unwrap()
        .read()
        .unwrap();
    assert_eq!(snapshot.keywords().postings("camera"), Some(&[2][..]));
    assert_eq!(snapshot.keywords().postings("сетк"), Some(&[0][..]));
}

#[test]
fn corpus_without_embeddings_is_rejected() {
    let fx = Fixture::new();
    let corpus = fx.root.join("bare.json");
    std::fs::write(&corpus, r#"[{"question": "q", "answer": "a"}]"#).unwrap();
    let output = fx.run(&["build", "--corpus", path_arg(&corpus)]);
    assert!(!output.status.success());
    assert!(!fx.data_dir().join("snapshot.redb").exists());
}

#[test]
fn config_set_show_clear() {
    let fx = Fixture::new();

    fx.run_ok(&["config", "set", "top_k", "5"]);
    let shown: Value =
        serde_json::from_str(&fx.run_ok(&["config", "show", "--json"])).unwrap();
    let top_k = shown
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["key"] == "top_k")
        .unwrap();
    assert_eq!(top_k["value"], "5");
    assert_eq!(top_k["stored"], true);

    let out = fx.run_ok(&["config", "clear", "top_k"]);
    assert!(out.contains("Cleared top_k"));
    let out = fx.run_ok(&["config", "show"]);
    assert!(out.contains("top_k = 3 (default)"), "{out}");

    assert!(!fx.run(&["config", "set", "colour", "red"]).status.success());
    assert!(!fx.run(&["config", "set", "threshold", "x"]).status.success());
}

#[test]
fn status_reports_snapshot() {
    let fx = Fixture::new();
    let before = fx.run_ok(&["status"]);
    assert!(before.contains("No snapshot built yet."), "{before}");

    fx.build();
    let status: Value =
        serde_json::from_str(&fx.run_ok(&["status", "--json"])).unwrap();
    assert_eq!(status["snapshot"]["documents"], 3);
    assert_eq!(status["snapshot"]["dimension"], 3);
    assert_eq!(status["settings"]["threshold"], "0.15");
}
