use providers::{
    mock_script_reply, ChatProvider, MockChat, MockSound, MockSpeech, ProviderError, ProviderSet,
    SoundProvider, SpeechProvider,
};
use std::sync::Arc;
use studio::{GenerationWizard, MediaLibrary, WizardError, WizardState};

fn wizard_with_chat(chat: Arc<MockChat>, dir: &tempfile::TempDir) -> GenerationWizard {
    let mut providers = ProviderSet::mock();
    providers.chat = Some(chat as Arc<dyn ChatProvider>);
    GenerationWizard::new(providers, dir.path())
}

#[tokio::test]
async fn concept_to_finished_video() {
    let dir = tempfile::tempdir().unwrap();
    let sound = Arc::new(MockSound::default());
    let mut providers = ProviderSet::mock();
    providers.sound = Some(sound.clone() as Arc<dyn SoundProvider>);
    let mut wizard = GenerationWizard::new(providers, dir.path());

    let hello = wizard.greeting();
    assert_eq!(hello.state, WizardState::CollectingConcept);

    let reply = wizard.send("A 45 second noir short about a lost umbrella").await;
    assert_eq!(reply.state, WizardState::ConfirmingParameters);
    assert!(reply.messages[0].contains("45 seconds"));
    assert!(reply.messages[0].contains("noir"));

    let reply = wizard.send("no music please").await;
    assert_eq!(reply.state, WizardState::ConfirmingParameters);
    assert!(!wizard.session().params.as_ref().unwrap().include_music);

    let reply = wizard.send("yes").await;
    assert_eq!(reply.state, WizardState::ReviewingScript);
    assert!(reply.messages[0].contains("Mock Story"));
    assert!(wizard.session().script.is_some());

    let reply = wizard.send("looks good").await;
    assert_eq!(reply.state, WizardState::Complete);
    assert_eq!(sound.calls(), 0);

    let result = wizard.take_result().unwrap();
    assert_eq!(result.scenes.len(), 3);
    assert!(result.scenes.iter().all(|s| s.sound.is_none()));
    let draft = result.to_project_draft("Umbrella");
    assert_eq!(draft.duration, 15.0);
}

#[tokio::test]
async fn missing_chat_key_gives_guidance_and_keeps_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut providers = ProviderSet::mock();
    providers.chat = None;
    let mut wizard = GenerationWizard::new(providers, dir.path());

    wizard.send("a paper boat in the rain").await;
    let reply = wizard.send("yes").await;
    assert_eq!(reply.state, WizardState::ConfirmingParameters);
    assert!(reply.messages[0].contains("OPENAI_API_KEY"));
}

#[tokio::test]
async fn missing_media_key_is_reported_before_generation() {
    let dir = tempfile::tempdir().unwrap();
    let mut providers = ProviderSet::mock();
    providers.video = None;
    let mut wizard = GenerationWizard::new(providers, dir.path());

    wizard.send("a paper boat in the rain").await;
    wizard.send("yes").await;
    let reply = wizard.send("yes").await;
    assert_eq!(reply.state, WizardState::ReviewingScript);
    assert!(reply.messages[0].contains("REPLICATE_API_TOKEN"));
}

#[tokio::test]
async fn unreadable_script_shows_the_raw_reply() {
    let dir = tempfile::tempdir().unwrap();
    let chat = Arc::new(MockChat::with_replies(["Sorry, I only write haiku."]));
    let mut wizard = wizard_with_chat(chat, &dir);

    wizard.send("a fox in the snow").await;
    let reply = wizard.send("go ahead").await;
    assert_eq!(reply.state, WizardState::ConfirmingParameters);
    assert_eq!(reply.messages[0], "Sorry, I only write haiku.");

    // the next attempt falls back to the canned script
    let reply = wizard.send("yes").await;
    assert_eq!(reply.state, WizardState::ReviewingScript);
}

#[tokio::test]
async fn provider_errors_return_to_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let chat = Arc::new(MockChat::default());
    chat.push_error(ProviderError::RateLimited("too many requests".into()));
    let mut wizard = wizard_with_chat(chat, &dir);

    wizard.send("a fox in the snow").await;
    let reply = wizard.send("yes").await;
    assert_eq!(reply.state, WizardState::ConfirmingParameters);
    assert!(reply.messages[0].contains("too many requests"));
}

#[tokio::test]
async fn feedback_revises_the_script() {
    let dir = tempfile::tempdir().unwrap();
    let revised = r#"```json
{"title": "Darker Story", "duration": 10, "scenes": [
  {"sceneNumber": 1, "visualPrompt": "rain-soaked alley at night", "duration": 10}
]}
```"#;
    let chat = Arc::new(MockChat::with_replies([mock_script_reply(), revised.to_string()]));
    let mut wizard = wizard_with_chat(chat.clone(), &dir);

    wizard.send("a fox in the snow").await;
    wizard.send("yes").await;
    let reply = wizard.send("make it darker").await;
    assert_eq!(reply.state, WizardState::ReviewingScript);
    let script = wizard.session().script.as_ref().unwrap();
    assert_eq!(script.title, "Darker Story");
    assert_eq!(script.scenes.len(), 1);

    let requests = chat.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1]
        .iter()
        .any(|m| m.content.contains("make it darker")));
}

#[tokio::test]
async fn unrecognized_text_extends_the_concept() {
    let dir = tempfile::tempdir().unwrap();
    let mut wizard = GenerationWizard::new(ProviderSet::mock(), dir.path());
    wizard.send("a lighthouse").await;
    wizard.send("with a keeper who paints").await;
    let params = wizard.session().params.as_ref().unwrap();
    assert_eq!(params.concept, "a lighthouse with a keeper who paints");
}

#[tokio::test]
async fn failed_run_then_new_message_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let mut providers = ProviderSet::mock();
    providers.speech = Some(Arc::new(MockSpeech::failing(ProviderError::failed("tts down")))
        as Arc<dyn SpeechProvider>);
    let mut wizard = GenerationWizard::new(providers, dir.path());

    wizard.send("a fox in the snow").await;
    wizard.send("yes").await;
    let reply = wizard.send("yes").await;
    assert_eq!(reply.state, WizardState::Failed);
    assert!(reply.messages[0].contains("speech"));
    assert!(matches!(
        wizard.take_result(),
        Err(WizardError::NotComplete(WizardState::Failed))
    ));

    let first_session = wizard.session().id;
    let reply = wizard.send("a whale singing").await;
    assert_eq!(reply.state, WizardState::ConfirmingParameters);
    assert_ne!(wizard.session().id, first_session);
    assert_eq!(wizard.session().params.as_ref().unwrap().concept, "a whale singing");
}

#[tokio::test]
async fn start_over_resets_mid_flow() {
    let dir = tempfile::tempdir().unwrap();
    let mut wizard = GenerationWizard::new(ProviderSet::mock(), dir.path());
    wizard.send("a fox in the snow").await;
    wizard.send("yes").await;
    let reply = wizard.send("let's start over").await;
    assert_eq!(reply.state, WizardState::CollectingConcept);
    assert!(wizard.session().script.is_none());
}

#[tokio::test]
async fn library_search_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let search = Arc::new(providers::MockSearch::default());
    let cache = Arc::new(project::MediaCache::open(dir.path().join("cache.json")));
    let library = MediaLibrary::new(search.clone()).with_cache(cache.clone());

    let first = library.search("Rain").await.unwrap();
    assert_eq!(first.len(), 1);
    let again = library.search("  rain ").await.unwrap();
    assert_eq!(again, first);
    assert_eq!(search.calls(), 1);
    assert_eq!(cache.len(), 1);

    let reopened = project::MediaCache::open(dir.path().join("cache.json"));
    assert_eq!(reopened.len(), 1);
}

#[tokio::test]
async fn confirmation_with_a_change_applies_it_first() {
    let dir = tempfile::tempdir().unwrap();
    let chat = Arc::new(MockChat::default());
    let mut wizard = wizard_with_chat(chat.clone(), &dir);

    wizard.send("a fox in the snow").await;
    let reply = wizard.send("yes but make it 60 seconds").await;
    assert_eq!(reply.state, WizardState::ReviewingScript);
    assert_eq!(wizard.session().params.as_ref().unwrap().duration_secs, 60);

    let requests = chat.requests();
    assert!(requests[0]
        .iter()
        .any(|m| m.content.contains("60-second")));
}
