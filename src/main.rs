use std::io::{self, BufRead, Write};

use log::info;
use serde::Deserialize;
use uuid::Uuid;

use rehearse::transcript::TypedTranscript;
use rehearse::{
    Config, EvaluationClient, HttpLedger, LedgerKind, MemoryLedger, Narrator, Question,
    SessionController, SessionError, SessionState, TranscriptSource,
};

#[derive(Deserialize)]
struct QuestionEntry {
    question: String,
    answer: String,
}

fn load_questions(path: Option<String>) -> anyhow::Result<Vec<Question>> {
    let entries: Vec<QuestionEntry> = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        }
        None => {
            info!("no question file given, using the built-in warm-up set");
            vec![
                QuestionEntry {
                    question: "Tell me about a project you are proud of and the part you played in it."
                        .to_string(),
                    answer: "A concrete project, the candidate's own contribution, and a measurable outcome."
                        .to_string(),
                },
                QuestionEntry {
                    question: "How would you debug a service whose latency doubled overnight?"
                        .to_string(),
                    answer: "Check recent deploys and config changes, compare metrics before and after, profile the hot path, then bisect."
                        .to_string(),
                },
            ]
        }
    };

    Ok(entries
        .into_iter()
        .map(|e| Question::new(e.question, e.answer))
        .collect())
}

fn read_answer(stdin: &mut impl BufRead) -> io::Result<String> {
    // Multi-line answers end with an empty line.
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        lines.push(line.to_string());
    }
    Ok(lines.join(" "))
}

fn read_choice(stdin: &mut impl BufRead, prompt: &str) -> io::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    stdin.read_line(&mut line)?;
    Ok(line.trim().to_lowercase())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::from_env();
    let questions = load_questions(std::env::args().nth(1))?;

    let ledger = match config.ledger_token.clone() {
        Some(token) => LedgerKind::Http(HttpLedger::new(
            config.ledger_base_url.clone(),
            Some(token),
            config.ledger_user_id.clone(),
        )),
        None => LedgerKind::Memory(MemoryLedger::new()),
    };
    let evaluator = EvaluationClient::new(&config);
    let narrator = Narrator::new(config.narration_command.clone());

    let mut controller = SessionController::new(
        Uuid::new_v4(),
        questions,
        TranscriptSource::Typed(TypedTranscript::new()),
        evaluator,
        ledger,
        narrator,
    );

    let stdin = io::stdin();
    let mut stdin = stdin.lock();

    controller.begin().await?;
    println!("Rehearsal session {} started.", controller.session_id());

    while !controller.state().is_terminal() {
        if let SessionState::AwaitingAnswer(index) = controller.state() {
            let question = controller
                .current_question()
                .map(|q| q.text.clone())
                .unwrap_or_default();
            println!("\nQuestion {}: {}", index + 1, question);
            println!("(type your answer, finish with an empty line)");

            let answer = read_answer(&mut stdin)?;
            if let TranscriptSource::Typed(t) = controller.transcript_mut() {
                t.set_text(&answer);
            }

            match controller.submit().await {
                Ok(result) => {
                    println!("\nRating: {}/10", result.rating);
                    println!("Feedback: {}", result.feedback);
                }
                Err(SessionError::SubmissionRejected { got, min }) => {
                    println!(
                        "That answer is too short ({} of {} characters) - try again.",
                        got, min
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        while let SessionState::AwaitingConfirmation(_) = controller.state() {
            match read_choice(&mut stdin, "[s]ave answer or [r]edo? ")?.as_str() {
                "r" | "redo" => {
                    controller.re_record().await?;
                    break;
                }
                "s" | "save" | "" => match controller.confirm_save().await {
                    Ok(()) => break,
                    Err(SessionError::DuplicateAnswer) => {
                        println!("This question already has a saved answer.");
                    }
                    Err(e) => {
                        println!("Save failed: {} - you can retry or redo.", e);
                    }
                },
                _ => {}
            }
        }
    }

    let summary = controller.summary().await?;
    println!(
        "\nSession complete: {} answers saved, average rating {:.1}/10.",
        summary.answered, summary.average_rating
    );
    Ok(())
}
