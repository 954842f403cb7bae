//! Import spellings that bind a module or symbol under a name other than the
//! target file's stem.

use std::fs;
use std::path::Path;

use semgraph::config::Config;
use semgraph::pipeline::Pipeline;
use semgraph::semantic::{CallSite, SemanticGraph};
use tempfile::TempDir;

fn write_project(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().expect("should create temp dir");
    for (rel, content) in files {
        let path = temp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    temp
}

fn analyze(root: &Path) -> SemanticGraph {
    Pipeline::new(root, Config::default())
        .expect("root should be accessible")
        .run()
        .expect("pipeline should succeed")
        .graph
}

fn file(root: &Path, rel: &str) -> String {
    root.canonicalize().unwrap().join(rel).to_string_lossy().into_owned()
}

fn call<'g>(graph: &'g SemanticGraph, callee: &str) -> &'g CallSite {
    graph
        .call_sites
        .iter()
        .find(|c| c.callee_name == callee)
        .unwrap_or_else(|| panic!("no call to {callee}"))
}

#[test]
fn test_python_package_imports() {
    let project = write_project(&[
        ("pkg/__init__.py", "def helper():\n    return 1\n"),
        ("pkg/a.py", "def fa():\n    return 2\n"),
        (
            "main.py",
            "import pkg\nimport pkg.a\n\n\ndef run():\n    pkg.helper()\n    pkg.a.fa()\n",
        ),
    ]);
    let root = project.path();
    let graph = analyze(root);

    assert_eq!(
        graph.dependency_graph.get(&file(root, "main.py")),
        Some(&vec![file(root, "pkg/__init__.py"), file(root, "pkg/a.py")])
    );

    let helper = call(&graph, "pkg.helper");
    assert!(helper.is_resolved);
    assert_eq!(
        helper.callee_id.as_str(),
        format!("{}::helper", file(root, "pkg/__init__.py"))
    );

    let fa = call(&graph, "pkg.a.fa");
    assert!(fa.is_resolved);
    assert_eq!(fa.callee_id.as_str(), format!("{}::fa", file(root, "pkg/a.py")));

    assert_eq!(graph.statistics.unresolved_calls, 0);
}

#[test]
fn test_typescript_default_import() {
    let project = write_project(&[
        (
            "svc.ts",
            "export default class UserService {\n  find(id: string): string {\n    return id;\n  }\n}\n",
        ),
        (
            "main.ts",
            "import Svc from './svc';\n\nexport function run(): string {\n  const s = new Svc();\n  return s.find(\"1\");\n}\n",
        ),
    ]);
    let root = project.path();
    let graph = analyze(root);
    let svc = file(root, "svc.ts");

    let constructed = call(&graph, "Svc");
    assert!(constructed.is_resolved);
    assert_eq!(constructed.callee_id.as_str(), format!("{svc}::UserService"));

    let find = call(&graph, "s.find");
    assert!(find.is_resolved);
    assert_eq!(find.callee_id.as_str(), format!("{svc}::UserService::find"));
}

#[test]
fn test_default_import_without_default_export_stays_unresolved() {
    let project = write_project(&[
        ("svc.ts", "export class UserService {}\n"),
        (
            "main.ts",
            "import Svc from './svc';\n\nexport function run() {\n  return new Svc();\n}\n",
        ),
    ]);
    let graph = analyze(project.path());

    assert!(!call(&graph, "Svc").is_resolved);
    assert_eq!(graph.statistics.unresolved_calls, 1);
}
