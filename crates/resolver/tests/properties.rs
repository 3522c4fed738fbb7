use proptest::prelude::*;
use resolver::{normalize, prepare_for_compilation, MemoryLookup};

fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("```".to_string()),
        Just("```solidity\n".to_string()),
        Just("// SPDX-License-Identifier: MIT\n".to_string()),
        Just("pragma solidity ^0.8.0;\n".to_string()),
        Just("pragma abicoder v2;\n".to_string()),
        Just("import \"./Dep.sol\";\n".to_string()),
        Just("contract Foo {}\n".to_string()),
        Just("/* note */\n".to_string()),
        Just("Here is your contract:\n".to_string()),
        "[a-zA-Z ;{}\n`]{0,20}",
    ]
}

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(fragment(), 0..8).prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn normalize_is_idempotent(text in document()) {
        let once = normalize(&text);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_is_idempotent_on_arbitrary_text(text in "\\PC{0,200}") {
        let once = normalize(&text);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn assembled_output_has_one_license_and_pragma(text in document()) {
        let lookup = MemoryLookup::new().with_source(
            "./Dep.sol",
            "// SPDX-License-Identifier: GPL-3.0\npragma solidity >=0.8.0;\ncontract Dep {}",
        );

        if let Ok(prepared) = prepare_for_compilation(&text, &lookup) {
            let licenses = prepared
                .source
                .lines()
                .filter(|line| line.starts_with("// SPDX-License-Identifier:"))
                .count();
            let pragmas = prepared
                .source
                .lines()
                .filter(|line| line.starts_with("pragma solidity"))
                .count();
            prop_assert_eq!(licenses, 1);
            prop_assert_eq!(pragmas, 1);

            let again = prepare_for_compilation(&text, &lookup).unwrap();
            prop_assert_eq!(prepared.source, again.source);
        }
    }
}
