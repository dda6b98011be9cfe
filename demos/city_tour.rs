/// City Tour example — plays the bundled sample scenario on autopilot.
///
/// A short tour: arrival → market → clock tower (with a dice check) → farewell.
/// Always takes the first offered choice and prints every event it sees.
///
/// Run with: cargo run --example city_tour

use narrative_playback::core::director::NarrativeDirector;
use narrative_playback::schema::event::PlaybackEvent;
use narrative_playback::schema::scenario::Scenario;

fn main() {
    // --- Load the sample scenario and its configuration ---
    let scenario = Scenario::load_from_json(std::path::Path::new(
        "tests/fixtures/city_tour.json",
    ))
    .expect("Failed to load city tour scenario");

    let mut director = NarrativeDirector::builder()
        .scenario(scenario)
        .config_file("tests/fixtures/city_tour.ron")
        .seed(2026)
        .build()
        .expect("Failed to build director");

    // --- Render events as they arrive ---
    director.channel_mut().subscribe_all(|event| {
        match event {
            PlaybackEvent::SceneChanged { scene_id } => println!("\n=== {} ===", scene_id),
            PlaybackEvent::DialogueShow(shown) => println!("{}: {}", shown.speaker, shown.text),
            PlaybackEvent::ChoicesShow { choices } => {
                for choice in choices {
                    println!("    - {}", choice.text);
                }
            }
            PlaybackEvent::VariablesDelta { deltas } => {
                for d in deltas {
                    println!("    {} {:+} -> {}", d.variable, d.delta, d.value);
                }
            }
            PlaybackEvent::DiceRolled(roll) => {
                println!("    rolled {} (needed {}): {:?}", roll.roll, roll.difficulty, roll.outcome)
            }
            PlaybackEvent::Diagnostic(diag) => println!("    ! {}", diag.message),
            _ => {}
        }
        Ok(())
    });

    // --- Play until the tour is over ---
    director.start().expect("Failed to start playback");
    while !director.is_ended() {
        let chose = director.choose(0).expect("Choice failed");
        if !chose {
            director.advance().expect("Advance failed");
        }
    }

    println!("\n--- Tour complete ---");
    println!("Choices taken: {}", director.history().len());
    println!("Final score: {}", director.final_score());
    if let Some(ending) = director.ending() {
        println!("{} [{}]: {}", ending.title, ending.grade, ending.message);
    }
}
