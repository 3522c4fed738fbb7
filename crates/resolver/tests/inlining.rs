use resolver::{
    prepare_for_compilation, resolve, DiagnosticKind, FsLookup, ImportGraph, LayeredLookup,
    MemoryLookup, NodeStatus, Pipeline, SourceUnit, StdLibrary,
};
use tempfile::TempDir;

const FOO: &str = "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\nimport \"./Ownable.sol\";\ncontract Foo is Ownable {}";

const OWNABLE: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.0;

contract Ownable {
    address public owner;

    constructor() {
        owner = msg.sender;
    }
}
"#;

fn count_lines_starting_with(source: &str, prefix: &str) -> usize {
    source
        .lines()
        .filter(|line| line.trim_start().starts_with(prefix))
        .count()
}

#[test]
fn test_foo_is_ownable() {
    let lookup = MemoryLookup::new().with_source("./Ownable.sol", OWNABLE);
    let prepared = prepare_for_compilation(FOO, &lookup).unwrap();
    let source = &prepared.source;

    assert_eq!(count_lines_starting_with(source, "// SPDX-License-Identifier:"), 1);
    assert_eq!(count_lines_starting_with(source, "pragma solidity"), 1);
    assert_eq!(source.matches("contract Ownable").count(), 1);
    assert!(source.find("contract Ownable").unwrap() < source.find("contract Foo").unwrap());
    assert_eq!(count_lines_starting_with(source, "import"), 0);
    assert!(prepared.diagnostics.is_empty());
}

#[test]
fn test_foo_is_ownable_with_builtin_library() {
    let prepared = prepare_for_compilation(FOO, &StdLibrary::builtin()).unwrap();
    let source = &prepared.source;

    let context = source.find("abstract contract Context").unwrap();
    let ownable = source.find("abstract contract Ownable").unwrap();
    let foo = source.find("contract Foo").unwrap();
    assert!(context < ownable && ownable < foo);
    assert_eq!(count_lines_starting_with(source, "pragma solidity"), 1);
    assert!(prepared.diagnostics.is_empty());
}

#[test]
fn test_fenced_input() {
    let text = format!("```solidity\n{}\n```", FOO);
    let normalized = resolver::normalize(&text);

    assert!(!normalized.contains('`'));
    assert!(normalized.starts_with("//") || normalized.starts_with("pragma"));

    let lookup = MemoryLookup::new().with_source("./Ownable.sol", OWNABLE);
    let prepared = prepare_for_compilation(&text, &lookup).unwrap();
    assert!(!prepared.source.contains('`'));
}

#[test]
fn test_alias_spellings_inline_once() {
    let text = "\
// SPDX-License-Identifier: MIT
pragma solidity ^0.8.0;
import \"./Ownable.sol\";
import \"@openzeppelin/contracts/access/Ownable.sol\";
contract Foo is Ownable {}";

    let prepared = prepare_for_compilation(text, &StdLibrary::builtin()).unwrap();

    assert_eq!(prepared.source.matches("contract Ownable").count(), 1);
    assert_eq!(prepared.source.matches("contract Context").count(), 1);
    assert!(prepared
        .diagnostics
        .iter()
        .all(|d| d.kind == DiagnosticKind::DuplicateSymbol));
    assert!(prepared
        .diagnostics
        .iter()
        .any(|d| d.path == "@openzeppelin/contracts/access/Ownable.sol"));
}

#[test]
fn test_cycle_terminates() {
    let lookup = MemoryLookup::new()
        .with_source("A.sol", "pragma solidity ^0.8.0;\nimport \"B.sol\";\ncontract A {}")
        .with_source("B.sol", "pragma solidity ^0.8.0;\nimport \"A.sol\";\ncontract B {}");

    let root = SourceUnit::root("import \"A.sol\";\ncontract Root {}");
    let resolution = resolve(&root, &lookup).unwrap();

    assert_eq!(resolution.dependencies.len(), 2);
    assert!(resolution
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::CyclicImport));

    let prepared = prepare_for_compilation("import \"A.sol\";\ncontract Root {}", &lookup).unwrap();
    assert_eq!(prepared.source.matches("contract A ").count(), 1);
    assert_eq!(prepared.source.matches("contract B ").count(), 1);
}

#[test]
fn test_unresolved_import_keeps_best_effort_source() {
    let text = "pragma solidity ^0.8.0;\nimport \"./Missing.sol\";\nimport \"./Ownable.sol\";\ncontract Foo is Ownable, Missing {}";
    let lookup = MemoryLookup::new().with_source("./Ownable.sol", OWNABLE);
    let prepared = prepare_for_compilation(text, &lookup).unwrap();

    assert!(prepared.source.contains("contract Ownable"));
    assert!(prepared.source.contains("contract Foo is Ownable, Missing {}"));
    assert_eq!(prepared.messages(), vec!["unresolved import: `./Missing.sol`"]);
}

#[test]
fn test_no_imports_passthrough() {
    let text = "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\n\ncontract Plain {\n    uint256 x;\n}";
    let prepared = prepare_for_compilation(text, &MemoryLookup::new()).unwrap();

    assert_eq!(prepared.source, format!("{}\n", text));
}

#[test]
fn test_determinism() {
    let text = "\
pragma solidity ^0.8.0;
import \"@openzeppelin/contracts/token/ERC20/ERC20.sol\";
import \"@openzeppelin/contracts/access/Ownable.sol\";
import \"@openzeppelin/contracts/security/ReentrancyGuard.sol\";
contract Token is ERC20, Ownable, ReentrancyGuard {}";
    let library = StdLibrary::builtin();

    let first = prepare_for_compilation(text, &library).unwrap();
    let second = prepare_for_compilation(text, &library).unwrap();

    assert_eq!(first.source, second.source);
    assert_eq!(first.diagnostics, second.diagnostics);
}

#[test]
fn test_nested_package_imports() {
    let text = "import \"@openzeppelin/contracts/token/ERC20/ERC20.sol\";\ncontract Token is ERC20 {}";
    let prepared = prepare_for_compilation(text, &StdLibrary::builtin()).unwrap();
    let paths: Vec<&str> = prepared.resolution.dependencies.paths().collect();

    assert_eq!(
        paths,
        vec![
            "@openzeppelin/contracts/token/ERC20/IERC20.sol",
            "@openzeppelin/contracts/utils/Context.sol",
            "@openzeppelin/contracts/token/ERC20/ERC20.sol",
        ]
    );
}

#[test]
fn test_depth_limit() {
    let lookup = |path: &str| {
        let n: usize = path
            .strip_prefix("./L")?
            .strip_suffix(".sol")?
            .parse()
            .ok()?;
        Some(format!("import \"./L{}.sol\";\ncontract L{} {{}}", n + 1, n))
    };

    let prepared = Pipeline::new()
        .with_max_depth(10)
        .prepare("import \"./L0.sol\";\ncontract Root {}", &lookup)
        .unwrap();

    assert_eq!(prepared.resolution.dependencies.len(), 10);
    assert!(prepared
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::DepthLimitExceeded && d.path == "./L10.sol"));
}

#[test]
fn test_filesystem_fallback_with_remapping() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("src")).unwrap();
    std::fs::create_dir_all(temp.path().join("lib/acme/src")).unwrap();
    std::fs::write(
        temp.path().join("src/Vault.sol"),
        "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\nimport \"./Ownable.sol\";\nimport \"@acme/Math.sol\";\ncontract Vault is Ownable {}",
    )
    .unwrap();
    std::fs::write(temp.path().join("lib/acme/src/Math.sol"), "library Math {}").unwrap();

    let fs = FsLookup::new(
        temp.path(),
        vec![("@acme/".to_string(), "lib/acme/src/".to_string())],
        vec![],
    );
    let lookup = LayeredLookup::standard(StdLibrary::builtin(), Some(fs));

    let prepared = prepare_for_compilation(
        "import \"src/Vault.sol\";\ncontract App is Vault {}",
        &lookup,
    )
    .unwrap();
    let paths: Vec<&str> = prepared.resolution.dependencies.paths().collect();

    assert!(paths.contains(&"src/Vault.sol"));
    assert!(paths.contains(&"@acme/Math.sol"));
    assert!(prepared.source.contains("abstract contract Ownable"));
    assert!(prepared.source.contains("library Math {}"));
}

#[test]
fn test_tree_view() {
    let text = "import \"./Ownable.sol\";\nimport \"./Nope.sol\";\ncontract Foo is Ownable {}";
    let prepared = prepare_for_compilation(text, &StdLibrary::builtin()).unwrap();
    let tree = ImportGraph::from_resolution(&prepared.resolution).tree();

    assert_eq!(tree.children.len(), 2);
    assert_eq!(tree.children[0].children[0].path, "../utils/Context.sol");
    assert_eq!(tree.children[1].status, NodeStatus::Missing);
}

#[test]
fn test_fenced_example_in_natspec_survives() {
    let text = "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\n\n/// @notice Usage:\n/// ```solidity\n/// vault.deposit(1);\n/// ```\ncontract Vault {\n    function deposit(uint256 amount) external {}\n}";
    let prepared = prepare_for_compilation(text, &MemoryLookup::new()).unwrap();

    assert!(prepared.source.contains("/// vault.deposit(1);"));
    assert!(prepared.source.contains("contract Vault {"));
    assert!(prepared.source.contains("function deposit(uint256 amount) external {}"));
    assert!(prepared.diagnostics.is_empty());
}

#[test]
fn test_pragma_missing_semicolon() {
    let text = "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0\ncontract A {\n    uint256 x;\n    uint256 y;\n}";
    let prepared = prepare_for_compilation(text, &MemoryLookup::new()).unwrap();

    assert_eq!(
        prepared.source,
        "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\n\ncontract A {\n    uint256 x;\n    uint256 y;\n}\n"
    );
}
