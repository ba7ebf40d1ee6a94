//! Integration tests for the Mali-Ba rules engine.
//!
//! These tests drive complete games through the public API, from setup to
//! the end of the game.

use maliba_core::codec::{NUM_DISTINCT_ACTIONS, PASS_ACTION};
use maliba_core::*;

fn config_with_seed(seed: u64) -> GameConfig {
    GameConfig {
        seed,
        ..GameConfig::default()
    }
}

/// Pass setup and place every token with the first legal placement
fn complete_setup(game: &mut GameState) {
    let mut iterations = 0;
    while game.phase() != GamePhase::Play && iterations < 10 {
        let action = game.legal_actions()[0];
        game.apply_action(action).unwrap();
        iterations += 1;
    }
    assert_eq!(game.phase(), GamePhase::Play, "setup should finish quickly");
}

/// Play random legal actions until the game ends or `max_steps` is reached
fn play_random(game: &mut GameState, max_steps: usize) {
    for _ in 0..max_steps {
        if game.is_terminal() {
            break;
        }
        let action = game
            .random_action()
            .expect("a running game always has a legal action");
        game.apply_action(action).unwrap();
    }
}

#[test]
fn test_setup_phase_completes() {
    let mut game = GameState::new(GameConfig::default()).unwrap();
    assert_eq!(game.phase(), GamePhase::Setup);
    assert_eq!(game.legal_actions(), &[PASS_ACTION]);

    complete_setup(&mut game);
    assert_eq!(game.current_player(), 0);
    for player in 0..2 {
        let tokens = game.token_hexes(player);
        assert_eq!(tokens.len(), 1);
        assert!(!game.board().is_city(&tokens[0]));
    }
    // Setup pass plus one placement per player
    assert_eq!(game.history().len(), 3);
}

#[test]
fn test_random_game_simulation() {
    for seed in 0..4 {
        let mut game = GameState::new(config_with_seed(seed)).unwrap();
        play_random(&mut game, 1000);

        assert!(game.is_terminal(), "seed {} did not finish", seed);
        assert!(game.end_reason().is_some());
        assert!(game.legal_actions().is_empty());
        assert!(game.move_count() <= game.config().rules.max_moves);

        let returns = game.returns();
        assert_eq!(returns.len(), 2);
        if game.end_reason() != Some(EndReason::MoveCap) {
            assert!(returns.iter().any(|&r| r == 1.0) || returns.iter().all(|&r| r <= 0.0));
        }
    }
}

#[test]
fn test_equal_seeds_replay_identically() {
    let mut a = GameState::new(config_with_seed(11)).unwrap();
    let mut b = GameState::new(config_with_seed(11)).unwrap();
    play_random(&mut a, 60);
    play_random(&mut b, 60);
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
}

#[test]
fn test_undo_reverts_every_action() {
    for seed in 0..3 {
        let mut game = GameState::new(config_with_seed(seed)).unwrap();
        for _ in 0..80 {
            if game.is_terminal() {
                break;
            }
            let action = game.random_action().unwrap();
            let before = game.to_json().unwrap();
            let legal_before = game.legal_actions().to_vec();

            game.apply_action(action).unwrap();
            game.undo().unwrap();
            assert_eq!(game.to_json().unwrap(), before, "undo of {} diverged", action);
            assert_eq!(game.legal_actions(), legal_before.as_slice());

            game.apply_action(action).unwrap();
        }
    }
}

#[test]
fn test_serialization_round_trip() {
    let mut game = GameState::new(config_with_seed(5)).unwrap();
    for step in 0..120 {
        if game.is_terminal() {
            break;
        }
        if step % 10 == 0 {
            let json = game.to_json().unwrap();
            let restored = GameState::from_json(game.config().clone(), &json).unwrap();
            assert_eq!(restored.to_json().unwrap(), json);
            assert_eq!(restored.legal_actions(), game.legal_actions());
        }
        let action = game.random_action().unwrap();
        game.apply_action(action).unwrap();
    }
}

#[test]
fn test_legal_actions_decode_to_their_moves() {
    let mut game = GameState::new(config_with_seed(3)).unwrap();
    for _ in 0..60 {
        if game.is_terminal() {
            break;
        }
        let legal = game.legal_moves().clone();
        assert!(!legal.is_empty());
        assert!(legal.actions.windows(2).all(|w| w[0] < w[1]));
        for (id, mv) in legal.iter() {
            assert_eq!(&decode(&game, id), mv, "decode of {}", id);
            assert_eq!(encode(game.board(), mv), Some(id), "encode of {}", mv);
        }
        let action = game.random_action().unwrap();
        game.apply_action(action).unwrap();
    }
}

#[test]
fn test_action_strings_round_trip() {
    let mut game = GameState::new(config_with_seed(8)).unwrap();
    for _ in 0..60 {
        if game.is_terminal() {
            break;
        }
        for &id in game.legal_actions() {
            let text = action_to_string(&game, id);
            assert_eq!(parse_action(&game, &text), Some(id), "parse of {:?}", text);
        }
        let action = game.random_action().unwrap();
        game.apply_action(action).unwrap();
    }
}

#[test]
fn test_malformed_ids_are_rejected() {
    let mut game = GameState::new(GameConfig::default()).unwrap();
    complete_setup(&mut game);
    let before = game.to_json().unwrap();

    for id in [NUM_DISTINCT_ACTIONS, NUM_DISTINCT_ACTIONS + 17, u32::MAX] {
        assert_eq!(decode(&game, id), Move::Invalid);
        assert_eq!(game.apply_action(id), Err(GameError::InvalidAction(id)));
    }
    assert_eq!(game.to_json().unwrap(), before);
}

#[test]
fn test_bots_finish_a_game() {
    let config = GameConfig {
        seed: 21,
        players: vec![PlayerType::Heuristic; 3],
        ..GameConfig::default()
    };
    let mut game = GameState::new(config).unwrap();
    let mut bots = vec![
        Bot::with_seed(0, BotDifficulty::Easy, 1),
        Bot::with_seed(1, BotDifficulty::Medium, 2),
        Bot::with_seed(2, BotDifficulty::Hard, 3),
    ];

    let mut steps = 0;
    while !game.is_terminal() {
        let player = game.current_player() as usize;
        let action = bots[player].choose_action(&game).unwrap();
        game.apply_action(action).unwrap();
        steps += 1;
        assert!(steps <= 1000);
    }
    assert_eq!(game.returns().len(), 3);
}

#[test]
fn test_route_commands_through_apply_move() {
    let mut game = GameState::new(GameConfig::default()).unwrap();
    complete_setup(&mut game);

    // Unknown routes are refused without touching the state
    let before = game.to_json().unwrap();
    assert_eq!(
        game.apply_move(Move::TradeRouteDelete { id: 4 }),
        Err(GameError::Route(RouteRejection::UnknownRoute(4)))
    );
    assert_eq!(
        game.apply_move(Move::parse("unroute #4")),
        Err(GameError::Route(RouteRejection::UnknownRoute(4)))
    );
    assert_eq!(game.to_json().unwrap(), before);
}
