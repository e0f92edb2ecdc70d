// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use vidsage::analysis::{build_prompt, Question};
use vidsage::render::render_markdown;
use vidsage::stager::{extension_for, mime_for_extension};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    file_name: &'a str,
    question: &'a str,
    answer: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let ext = extension_for(input.file_name);
    assert!(!ext.is_empty());
    assert!(!ext.contains('/') && !ext.contains('\\'));
    let _ = mime_for_extension(&ext);

    if let Ok(question) = Question::new(input.question) {
        let prompt = build_prompt("{question}", &question);
        assert_eq!(prompt, question.as_str());
    }

    let html = render_markdown(input.answer);
    assert!(!html.contains("<script"));
});
