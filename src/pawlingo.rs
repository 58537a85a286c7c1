use std::sync::Arc;

use anyhow::{Context, Result};
use pawlingo::command::{Command, HELP};
use pawlingo::phrases::PhraseBook;
use pawlingo::translator::{Translation, TranslatorSession};
use pawlingo::{
    APP_NAME_PRETTY, Config, ConfigManager, CpalCapture, CpalPermissions, DEFAULT_LOG_LEVEL,
    DetectorEvent, DetectorOptions, LOG_ENV, Pet, SoundActivityDetector, VERSION,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize the logger
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load()?;
    // save back the config to create the file if it doesn't exist
    config_manager.save(&config)?;
    info!(path = %config_manager.config_path().display(), "Config loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let (detector, mut events) = SoundActivityDetector::new(
        CpalCapture::new(),
        Arc::new(CpalPermissions),
        DetectorOptions::from_config(&config),
        Handle::current(),
    );
    let mut screen = TranslatorSession::new(PhraseBook::from_config(&config), config.pet);

    println!("{} {} - pet translator", APP_NAME_PRETTY, VERSION);
    println!("{}", HELP);
    print_header(&screen);

    let _permission_request = detector.spawn_permission_request();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                let denied = event == DetectorEvent::PermissionDenied;
                event.dispatch(&mut screen);
                if let Some(translation) = screen.take_result() {
                    print_translation(&translation);
                }
                if denied {
                    println!("Enable microphone access to use the translator.");
                }
                println!("[{}]", screen.status().title());
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match Command::parse(&line) {
                    Command::Toggle => {
                        match screen.begin_tap(detector.is_recording(), detector.check_permission()) {
                            Ok(()) => detector.toggle_recording(),
                            Err(e) => println!("{}", e),
                        }
                    }
                    Command::SelectPet(pet) => {
                        screen.select_pet(pet);
                        print_header(&screen);
                    }
                    Command::Swap => {
                        screen.swap_direction();
                        print_header(&screen);
                    }
                    Command::Help => println!("{}", HELP),
                    Command::Quit => break,
                    Command::Unknown(other) => warn!(command = %other, "Unknown command"),
                }
            }
        }
    }

    if detector.is_recording() {
        detector.toggle_recording();
    }
    info!("Bye");
    Ok(())
}

fn pet_name(pet: Pet) -> &'static str {
    match pet {
        Pet::Cat => "cat",
        Pet::Dog => "dog",
    }
}

fn print_header(screen: &TranslatorSession) {
    let (left, right) = screen.direction().labels();
    println!(
        "{} -> {} | listening to your {}",
        left,
        right,
        pet_name(screen.pet())
    );
}

fn print_translation(translation: &Translation) {
    if translation.sound_detected {
        println!("Your {} says: {}", pet_name(translation.pet), translation.text);
    } else {
        println!(
            "Your {} stayed quiet: {}",
            pet_name(translation.pet),
            translation.text
        );
    }
}
