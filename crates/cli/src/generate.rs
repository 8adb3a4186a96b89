use anyhow::Result;
use std::io::Write as _;
use studio::{GenerationWizard, ProgressEvent, WizardReply, WizardState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::app::App;

fn print_reply(reply: &WizardReply) {
    for message in &reply.messages {
        println!("\n{message}");
    }
}

fn prompt() {
    print!("\n> ");
    let _ = std::io::stdout().flush();
}

/// Interactive wizard on stdin/stdout. Finished videos are saved as projects.
pub async fn generate_command(app: &App, mock: bool) -> Result<()> {
    let providers = app.providers(mock)?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            eprintln!(
                "[{:>3}%] {} for scene {} done",
                event.percent, event.stage, event.scene
            );
        }
    });

    let mut wizard = GenerationWizard::new(providers, app.media_dir())
        .with_default_duration(app.settings.preferences.default_duration_secs)
        .with_progress(tx);
    if mock {
        println!("(mock providers: nothing leaves this machine)");
    }
    print_reply(&wizard.greeting());
    println!("Type \"quit\" to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if matches!(line, "quit" | "exit" | ":q") {
            break;
        }
        if matches!(
            wizard.state(),
            WizardState::ReviewingScript
        ) && studio::is_affirmative(line)
        {
            println!("Generating media, this can take several minutes...");
        }

        let reply = wizard.send(line).await;
        print_reply(&reply);

        if reply.state == WizardState::Complete {
            let result = wizard.take_result()?;
            let draft = result.to_project_draft(result.script.title.clone());
            let session = app.session().await?;
            match app.store.save_project(session.as_ref(), &draft).await {
                Ok(project) => {
                    info!("saved generated project {}", project.id);
                    println!(
                        "\nSaved as project {}. Open it with `storyreel open /editor/{}`.",
                        project.id, project.id
                    );
                }
                Err(e) => {
                    warn!("could not save generated project: {}", e);
                    println!("\nThe video was generated but could not be saved: {e}");
                }
            }
            println!("Send another idea to make a new video.");
        }
    }

    drop(wizard);
    let _ = progress.await;
    Ok(())
}
