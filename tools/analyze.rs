/// Analyze — runs the story analysis pipeline on a text file and prints the
/// resulting document as RON.
///
/// Usage: analyze --input <file.txt> [--kind text|document|transcript]
///                [--target-lang <code>] [--style plain|dashboard|export]
///                [--lexicon <file.ron>] [--story-id <id>]
use std::process;

use story_intel::core::lexicon::CueLexicon;
use story_intel::schema::InsightStyle;
use story_intel::{run_story_analysis, AnalysisRequest, PipelineConfig};

const USAGE: &str = "Usage: analyze --input <file.txt> [--kind text|document|transcript] \
    [--target-lang <code>] [--style plain|dashboard|export] [--lexicon <file.ron>] \
    [--story-id <id>]";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut input = None;
    let mut kind = "text".to_string();
    let mut target_lang = "en".to_string();
    let mut style = InsightStyle::Plain;
    let mut lexicon_path = None;
    let mut story_id = "story-local".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input = args.get(i).cloned();
            }
            "--kind" => {
                i += 1;
                kind = args.get(i).cloned().unwrap_or(kind);
            }
            "--target-lang" => {
                i += 1;
                target_lang = args.get(i).cloned().unwrap_or(target_lang);
            }
            "--style" => {
                i += 1;
                style = match args.get(i).map(String::as_str) {
                    Some("plain") => InsightStyle::Plain,
                    Some("dashboard") => InsightStyle::Dashboard,
                    Some("export") => InsightStyle::Export,
                    other => {
                        eprintln!("Error: unknown style {:?}", other.unwrap_or(""));
                        process::exit(1);
                    }
                };
            }
            "--lexicon" => {
                i += 1;
                lexicon_path = args.get(i).cloned();
            }
            "--story-id" => {
                i += 1;
                story_id = args.get(i).cloned().unwrap_or(story_id);
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("{USAGE}");
                process::exit(1);
            }
        }
        i += 1;
    }

    let input_path = input.unwrap_or_else(|| {
        eprintln!("Error: --input is required");
        eprintln!("{USAGE}");
        process::exit(1);
    });

    let source_text = match std::fs::read_to_string(&input_path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let lexicon = match lexicon_path {
        Some(path) => match CueLexicon::load_from_ron(std::path::Path::new(&path)) {
            Ok(lexicon) => lexicon,
            Err(e) => {
                eprintln!("Error: cannot load lexicon {}: {}", path, e);
                process::exit(1);
            }
        },
        None => CueLexicon::default(),
    };

    let request = AnalysisRequest {
        story_id,
        source_kind: kind,
        source_text,
        target_language: target_lang,
    };
    let config = PipelineConfig {
        insight_style: style,
        lexicon,
        ..PipelineConfig::default()
    };

    let analysis = match run_story_analysis(&request, &config) {
        Ok(analysis) => analysis,
        Err(e) => {
            eprintln!("Analysis failed: {}", e);
            process::exit(1);
        }
    };

    let gate = &analysis.document.quality_gate;
    eprintln!(
        "segments={} events={} beats={} insights={} gate={}",
        analysis.document.segments.len(),
        analysis.document.events.len(),
        analysis.document.beats.len(),
        analysis.document.insights.len(),
        if gate.passed { "pass" } else { "FAIL" }
    );
    for reason in &gate.reasons {
        eprintln!("  gate: {}", reason);
    }
    for issue in &analysis.issues {
        eprintln!("  issue[{:?}]: {} ({})", issue.severity, issue.code, issue.message);
    }

    match ron::ser::to_string_pretty(&analysis.document, ron::ser::PrettyConfig::default()) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => {
            eprintln!("Error: cannot serialize document: {}", e);
            process::exit(1);
        }
    }
}
