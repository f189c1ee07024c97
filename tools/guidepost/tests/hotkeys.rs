use guidepost::controller::WizardEvent;
use guidepost::hotkeys::{
    action_for_input, action_for_key, controls_legend, HotkeyAction, GLOBAL_BINDINGS,
    QUESTION_BINDINGS, TASK_BRIEF_BINDINGS, WELCOME_BINDINGS,
};
use guidepost::types::{Step, TaskSuccess};

#[test]
fn global_bindings_resolve_on_every_step() {
    for step in Step::ALL {
        assert_eq!(action_for_key('q', step), Some(HotkeyAction::Quit), "{step:?}");
        assert_eq!(
            action_for_key('r', step),
            Some(HotkeyAction::Wizard(WizardEvent::Reshare)),
            "{step:?}"
        );
    }
}

#[test]
fn next_key_is_absent_on_the_task_brief() {
    assert_eq!(action_for_key('n', Step::TaskBrief), None);
    for step in [Step::Welcome, Step::Q1TaskSuccess, Step::Q4WorkedWell] {
        assert_eq!(
            action_for_key('n', step),
            Some(HotkeyAction::Wizard(WizardEvent::Advance)),
            "{step:?}"
        );
    }
}

#[test]
fn task_keys_only_apply_to_the_brief() {
    assert_eq!(
        action_for_key('s', Step::TaskBrief),
        Some(HotkeyAction::Wizard(WizardEvent::StartTask))
    );
    assert_eq!(
        action_for_key('d', Step::TaskBrief),
        Some(HotkeyAction::Wizard(WizardEvent::FinishTask))
    );
    for step in [Step::Welcome, Step::Q2Difficulty] {
        assert_eq!(action_for_key('s', step), None, "{step:?}");
        assert_eq!(action_for_key('d', step), None, "{step:?}");
    }
}

#[test]
fn open_panel_is_unbound_on_welcome() {
    assert_eq!(action_for_key('o', Step::Welcome), None);
    assert_eq!(
        action_for_key('o', Step::Q3Confusing),
        Some(HotkeyAction::Wizard(WizardEvent::ReopenPanel))
    );
}

#[test]
fn unknown_keys_return_none() {
    for key in ['x', 'z', '!', ' ', '9'] {
        assert_eq!(action_for_key(key, Step::Q1TaskSuccess), None, "key '{key}'");
    }
}

#[test]
fn every_listed_binding_resolves_on_its_step() {
    let tables = [
        (Step::Welcome, WELCOME_BINDINGS.as_slice()),
        (Step::TaskBrief, TASK_BRIEF_BINDINGS.as_slice()),
        (Step::Q2Difficulty, QUESTION_BINDINGS.as_slice()),
        (Step::Q4WorkedWell, GLOBAL_BINDINGS.as_slice()),
    ];
    for (step, bindings) in tables {
        for binding in bindings {
            assert!(
                action_for_key(binding.key, step).is_some(),
                "'{}' ({}) should resolve on {step:?}",
                binding.key,
                binding.action
            );
        }
    }
}

#[test]
fn legend_lists_step_keys_and_answer_hint() {
    let legend = controls_legend(Step::TaskBrief);
    assert!(legend.starts_with("Keys: s start task  d I'm done  o open panel"));
    assert!(legend.contains("r reshare screen"));
    assert!(!legend.contains("answer:"));

    assert!(controls_legend(Step::Q1TaskSuccess).ends_with("answer: yes / partially / no"));
    assert!(controls_legend(Step::Q2Difficulty).ends_with("answer: 1-5"));
    assert!(controls_legend(Step::Q4WorkedWell).ends_with("answer: type a response"));
}

#[test]
fn free_text_legend_shows_prefixed_keys() {
    let legend = controls_legend(Step::Q3Confusing);
    assert!(legend.starts_with("Keys: :n next  :o open panel  :r reshare screen  :q quit"));
    assert!(controls_legend(Step::Q2Difficulty).starts_with("Keys: n next"));
}

#[test]
fn answers_map_to_the_displayed_field() {
    assert_eq!(
        action_for_input("Partially", Step::Q1TaskSuccess),
        Some(HotkeyAction::Wizard(WizardEvent::SelectTaskSuccess(
            TaskSuccess::Partially
        )))
    );
    assert_eq!(
        action_for_input("4", Step::Q2Difficulty),
        Some(HotkeyAction::Wizard(WizardEvent::SelectDifficulty(4)))
    );
    assert_eq!(action_for_input("6", Step::Q2Difficulty), None);
    assert_eq!(
        action_for_input("the search box", Step::Q3Confusing),
        Some(HotkeyAction::Wizard(WizardEvent::EditConfusing(
            "the search box".to_string()
        )))
    );
    assert_eq!(action_for_input("hello", Step::Welcome), None);
}

#[test]
fn single_letter_keys_win_over_choice_answers() {
    assert_eq!(
        action_for_input(" n ", Step::Q2Difficulty),
        Some(HotkeyAction::Wizard(WizardEvent::Advance))
    );
    assert_eq!(
        action_for_input("y", Step::Q1TaskSuccess),
        Some(HotkeyAction::Wizard(WizardEvent::SelectTaskSuccess(
            TaskSuccess::Yes
        )))
    );
}

#[test]
fn one_letter_free_text_answers_are_not_commands() {
    for step in [Step::Q3Confusing, Step::Q4WorkedWell] {
        for letter in ["q", "r", "n", "o"] {
            let action = action_for_input(letter, step);
            let expected = match step {
                Step::Q3Confusing => WizardEvent::EditConfusing(letter.to_string()),
                _ => WizardEvent::EditWorkedWell(letter.to_string()),
            };
            assert_eq!(action, Some(HotkeyAction::Wizard(expected)), "{letter} on {step:?}");
        }
    }
}

#[test]
fn prefixed_keys_are_commands_on_free_text_steps() {
    assert_eq!(action_for_input(":q", Step::Q4WorkedWell), Some(HotkeyAction::Quit));
    assert_eq!(
        action_for_input(" :r ", Step::Q3Confusing),
        Some(HotkeyAction::Wizard(WizardEvent::Reshare))
    );
    assert_eq!(
        action_for_input(":n", Step::Q3Confusing),
        Some(HotkeyAction::Wizard(WizardEvent::Advance))
    );
    assert_eq!(
        action_for_input(":x", Step::Q3Confusing),
        Some(HotkeyAction::Wizard(WizardEvent::EditConfusing(":x".to_string())))
    );
}
