//! Host behaviour tests.
//!
//! These run against the test guest in `tests/fixtures/test_guest.wat`, which
//! speaks the same ABI as the sanitizer module: a 4-byte SFNT version followed
//! by 4-byte table tags, each offered to the table-action callback.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

use ots_sandbox::prelude::*;

const GUEST: &str = include_str!("fixtures/test_guest.wat");

const TRUETYPE: [u8; 4] = [0x00, 0x01, 0x00, 0x00];

/// Helper to create a sanitizer backed by the test guest.
fn sanitizer() -> Sanitizer {
    Sanitizer::from_bytes(GUEST.as_bytes(), SanitizerConfig::default()).unwrap()
}

fn font(version: &[u8; 4], tables: &[&[u8; 4]]) -> Vec<u8> {
    let mut data = version.to_vec();
    for tag in tables {
        data.extend_from_slice(&tag[..]);
    }
    data
}

/// A truncated table directory is a sanitization failure, not a fatal error.
#[test]
fn test_truncated_otto_is_rejected() {
    let result = sanitizer().process(&[0x4F, 0x54, 0x54, 0x4F, 0x00], &ProcessOptions::new());
    match result {
        Err(err) => {
            assert!(err.is_sanitize(), "unexpected error: {err}");
            assert!(!err.is_fatal());
        }
        Ok(output) => panic!("expected rejection, got {} bytes", output.len()),
    }
}

#[test]
fn test_unknown_version_is_rejected() {
    let input = font(b"wOFF", &[b"head"]);
    let result = sanitizer().process(&input, &ProcessOptions::new());
    assert!(matches!(result, Err(SanitizerError::Sanitize)));
}

#[test]
fn test_truetype_succeeds() {
    let input = font(&TRUETYPE, &[b"head", b"hhea", b"glyf", b"loca"]);
    let output = sanitizer().process(&input, &ProcessOptions::new()).unwrap();

    assert_eq!(extension(&output), ".ttf");
    assert!(output.len() <= 8 * input.len());
    assert_eq!(output, input);
}

#[test]
fn test_reprocessing_is_idempotent() {
    let sanitizer = sanitizer();
    let input = font(b"OTTO", &[b"CFF ", b"cmap", b"name"]);
    let first = sanitizer.process(&input, &ProcessOptions::new()).unwrap();
    let second = sanitizer.process(&first, &ProcessOptions::new()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_drop_every_table_shrinks_output() {
    let sanitizer = sanitizer();
    let input = font(&TRUETYPE, &[b"head", b"glyf", b"loca"]);

    let warnings = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&warnings);
    let options = ProcessOptions::new()
        .table_action(|_| TableAction::Drop)
        .messages(move |level, msg| {
            assert_eq!(level, MessageLevel::Warning);
            assert_eq!(msg, "table dropped");
            *counter.lock().unwrap() += 1;
        });

    let default = sanitizer.process(&input, &ProcessOptions::new()).unwrap();
    let dropped = sanitizer.process(&input, &options).unwrap();

    assert!(dropped.len() < default.len());
    assert_eq!(dropped, TRUETYPE);
    assert_eq!(*warnings.lock().unwrap(), 3);
}

#[test]
fn test_tags_are_unpacked_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let options = ProcessOptions::new().table_action(move |tag| {
        sink.lock().unwrap().push(tag);
        TableAction::Default
    });

    let input = font(&TRUETYPE, &[b"OS/2", b"cvt ", b"glyf"]);
    sanitizer().process(&input, &options).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Tag::new(*b"OS/2"), Tag::new(*b"cvt "), Tag::new(*b"glyf")]
    );
}

#[test]
fn test_collection_index() {
    let sanitizer = sanitizer();
    let input = font(b"ttcf", &[b"head", b"glyf"]);

    let whole = sanitizer.process(&input, &ProcessOptions::new()).unwrap();
    assert_eq!(extension(&whole), ".ttc");

    let single = sanitizer.process(&input, &ProcessOptions::new().index(0)).unwrap();
    assert_eq!(extension(&single), ".ttf");
    assert_eq!(&single[4..], &input[4..]);
}

#[test]
fn test_custom_max_size() {
    let sanitizer = sanitizer();
    let input = font(&TRUETYPE, &[b"head", b"glyf"]);

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let options = ProcessOptions::new()
        .max_size(input.len() - 1)
        .messages(move |level, msg| sink.lock().unwrap().push((level, msg.to_string())));

    let result = sanitizer.process(&input, &options);
    assert!(matches!(result, Err(SanitizerError::Sanitize)));
    assert_eq!(
        *errors.lock().unwrap(),
        vec![(MessageLevel::Error, "output exceeds size limit".to_string())]
    );

    let output = sanitizer
        .process(&input, &ProcessOptions::new().max_size(input.len()))
        .unwrap();
    assert_eq!(output.len(), input.len());
}

#[test]
fn test_protocol_violations_are_fatal() {
    let sanitizer = sanitizer();

    let liar = sanitizer.process(&font(b"LIAR", &[b"head"]), &ProcessOptions::new());
    assert!(matches!(liar, Err(SanitizerError::OutputTooLarge { .. })));
    assert!(liar.unwrap_err().is_fatal());

    let ghost = sanitizer.process(&font(b"GHST", &[b"head"]), &ProcessOptions::new());
    assert!(matches!(ghost, Err(SanitizerError::UnknownSession(_))));
    assert!(ghost.unwrap_err().is_fatal());
}

#[test]
fn test_message_for_unknown_session_is_fatal() {
    let messages = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&messages);
    let options = ProcessOptions::new().messages(move |_, _| *counter.lock().unwrap() += 1);

    let result = sanitizer().process(&font(b"GHSM", &[b"head"]), &options);
    match result {
        Err(err @ SanitizerError::UnknownSession(_)) => assert!(err.is_fatal()),
        other => panic!("expected UnknownSession, got {:?}", other),
    }
    assert_eq!(*messages.lock().unwrap(), 0);
}

#[test]
fn test_message_outside_guest_memory_is_abi_error() {
    let result = sanitizer().process(&font(b"OOBM", &[b"head"]), &ProcessOptions::new());
    match result {
        Err(err @ SanitizerError::Abi(_)) => assert!(err.is_fatal()),
        other => panic!("expected Abi, got {:?}", other),
    }
}

/// Empty input resolves to a zero output bound and is simply rejected.
#[test]
fn test_empty_input_is_rejected() {
    let result = sanitizer().process(b"", &ProcessOptions::new());
    assert!(matches!(result, Err(SanitizerError::Sanitize)));
}

#[test]
fn test_missing_exports_are_abi_errors() {
    let wat = r#"(module (memory (export "memory") 1))"#;
    let sanitizer = Sanitizer::from_bytes(wat.as_bytes(), SanitizerConfig::default()).unwrap();
    let result = sanitizer.process(&font(&TRUETYPE, &[b"head"]), &ProcessOptions::new());
    assert!(matches!(result, Err(SanitizerError::Abi(_))));
}

#[test]
fn test_guest_trap_is_fatal() {
    let wat = r#"
        (module
          (memory (export "memory") 1)
          (func (export "gots_malloc") (param i32) (result i32) (i32.const 1024))
          (func (export "gots_process") (param i32 i32 i32 i32 i32) (result i32) unreachable))
    "#;
    let sanitizer = Sanitizer::from_bytes(wat.as_bytes(), SanitizerConfig::default()).unwrap();
    let result = sanitizer.process(&font(&TRUETYPE, &[b"head"]), &ProcessOptions::new());
    assert!(matches!(result, Err(SanitizerError::Trap(_))));
}

#[test]
fn test_reactor_is_initialized() {
    // gots_malloc fails until _initialize has run.
    let wat = r#"
        (module
          (memory (export "memory") 1)
          (global $heap (mut i32) (i32.const 0))
          (func (export "_initialize") (global.set $heap (i32.const 1024)))
          (func (export "gots_malloc") (param $len i32) (result i32)
            (local $ptr i32)
            (local.set $ptr (global.get $heap))
            (global.set $heap (i32.add (global.get $heap) (i32.const 64)))
            (local.get $ptr))
          (func (export "gots_process") (param i32 i32 i32 i32 i32) (result i32) (i32.const 0)))
    "#;
    let sanitizer = Sanitizer::from_bytes(wat.as_bytes(), SanitizerConfig::default()).unwrap();
    let result = sanitizer.process(&font(&TRUETYPE, &[b"head"]), &ProcessOptions::new());
    assert!(matches!(result, Err(SanitizerError::Sanitize)));
}

/// Concurrent calls only ever see their own tables and messages.
#[test]
fn test_concurrent_calls_do_not_cross_talk() {
    let sanitizer = sanitizer();

    let handles: Vec<_> = (0..8u8)
        .map(|worker| {
            let sanitizer = sanitizer.clone();
            thread::spawn(move || {
                let own: Vec<[u8; 4]> = (0..16u8).map(|i| [b'w', worker, b't', i]).collect();
                let tables: Vec<&[u8; 4]> = own.iter().collect();
                let input = font(&TRUETYPE, &tables);
                let expected_tags: HashSet<Tag> = own.iter().copied().map(Tag::new).collect();

                let seen = Arc::new(Mutex::new(Vec::new()));
                let sink = Arc::clone(&seen);
                let options = ProcessOptions::new().table_action(move |tag| {
                    sink.lock().unwrap().push(tag);
                    // Drop odd tables so each worker's output differs.
                    if tag.as_bytes()[3] % 2 == 1 {
                        TableAction::Drop
                    } else {
                        TableAction::Default
                    }
                });

                let mut outputs = Vec::new();
                for _ in 0..20 {
                    outputs.push(sanitizer.process(&input, &options).unwrap());
                }

                let seen = seen.lock().unwrap();
                assert_eq!(seen.len(), 16 * 20);
                assert!(seen.iter().all(|tag| expected_tags.contains(tag)));
                (input, options, outputs)
            })
        })
        .collect();

    for handle in handles {
        let (input, options, outputs) = handle.join().unwrap();
        let sequential = sanitizer.process(&input, &options).unwrap();
        assert_eq!(sequential.len(), 4 + 8 * 4);
        assert!(outputs.iter().all(|output| *output == sequential));
    }
}

#[tokio::test]
async fn test_concurrent_async_calls() {
    let sanitizer = sanitizer();
    let mut handles = Vec::new();
    for i in 0..4u8 {
        let sanitizer = sanitizer.clone();
        handles.push(tokio::spawn(async move {
            let input = font(b"OTTO", &[&[b'c', b'f', b'f', i]]);
            let output = sanitizer
                .process_async(input.clone(), ProcessOptions::new())
                .await
                .unwrap();
            (input, output)
        }));
    }
    for handle in handles {
        let (input, output) = handle.await.unwrap();
        assert_eq!(output, input);
        assert_eq!(extension(&output), ".otf");
    }
}

#[test]
fn test_extension_on_inputs() {
    assert_eq!(extension(b"wOF2"), ".woff2");
    assert_eq!(FontFormat::detect(b"wOFF\x00\x01"), Some(FontFormat::Woff));
    assert_eq!(extension(&[0x4F, 0x54, 0x54]), "");
}
