//! Integration tests for the trading engine.
//! Everything runs on seeded `ChaCha8Rng` sources, so each test is deterministic.

#[cfg(test)]
mod integration {
    use trader_sim_engine::config::{AssetSpec, PolicyConfig, SessionConfig};
    use trader_sim_engine::engine::{apply_event, multiplicative_step, MeanRevertingWalk, PriceEngine, PricePolicy};
    use trader_sim_engine::error::EngineError;
    use trader_sim_engine::ledger::{Ledger, LedgerPolicy};
    use trader_sim_engine::market::MarketState;
    use trader_sim_engine::session::{initialize, SessionState};
    use trader_sim_engine::types::{AssetClass, CostBasis, NewsEvent, HISTORY_LEN, PRICE_FLOOR};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn running(config: SessionConfig) -> SessionState {
        let mut s = initialize(config).unwrap();
        s.start();
        s
    }

    // ── Invariant: prices stay positive ───────────────────────────────────────

    #[test]
    fn multiplicative_walk_never_reaches_zero_under_extreme_volatility() {
        let mut cfg = SessionConfig::classic();
        for a in &mut cfg.assets {
            a.volatility = Some(0.99);
        }
        let mut s = running(cfg.with_seed(17));
        for _ in 0..5_000 {
            s.tick();
            for q in s.snapshot() {
                assert!(q.price > 0.0, "{} went non-positive: {}", q.asset, q.price);
            }
        }
    }

    #[test]
    fn additive_walk_is_floored_above_zero() {
        let mut cfg = SessionConfig::arcade();
        if let PolicyConfig::MeanReverting(p) = &mut cfg.policy {
            p.noise = 50.0;
            p.bot_jump = 25.0;
        }
        let mut s = running(cfg.with_seed(99));
        for _ in 0..2_000 {
            s.tick();
            for q in s.snapshot() {
                assert!(q.price >= PRICE_FLOOR, "{} fell below floor: {}", q.asset, q.price);
            }
        }
    }

    #[test]
    fn multiplicative_step_alone_stays_positive() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut price = 100.0_f64;
        for _ in 0..2_000 {
            price = multiplicative_step(price, 0.5, &mut rng);
            assert!(price > 0.0);
        }
    }

    // ── Ledger laws ───────────────────────────────────────────────────────────

    #[test]
    fn zero_fee_round_trip_restores_state() {
        let mut cfg = SessionConfig::classic();
        cfg.fee_rate = 0.0;
        let mut s = initialize(cfg).unwrap();
        let cash = s.ledger().cash();

        s.buy("NFLX", 7.0).unwrap();
        s.sell("NFLX", 7.0).unwrap();

        assert!((s.ledger().cash() - cash).abs() < 1e-9);
        assert_eq!(s.ledger().position("NFLX").quantity, 0.0);
        assert_eq!(s.ledger().position("NFLX").average_cost, 0.0);
    }

    #[test]
    fn average_cost_is_convex_combination_of_buy_prices() {
        let mut ledger = Ledger::new(
            1e12,
            LedgerPolicy {
                fee_rate: 0.001,
                tax_rate: 0.0,
                cost_basis: CostBasis::ExcludeFees,
            },
        );
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for _ in 0..200 {
            let price = rng.gen_range(1.0..500.0);
            let qty = rng.gen_range(0.1..50.0);
            lo = lo.min(price);
            hi = hi.max(price);
            ledger.buy("X", qty, price).unwrap();

            let avg = ledger.position("X").average_cost;
            assert!(avg >= lo - 1e-9 && avg <= hi + 1e-9, "avg {avg} outside [{lo}, {hi}]");
        }
        let held = ledger.position("X").quantity;
        ledger.sell("X", held, 10.0).unwrap();
        assert_eq!(ledger.position("X").average_cost, 0.0);
    }

    #[test]
    fn buy_exactly_affordable_succeeds() {
        let mut cfg = SessionConfig::classic();
        cfg.initial_cash = 4.0 * 150.0 * (1.0 + cfg.fee_rate);
        let mut s = initialize(cfg).unwrap();
        s.buy("AAPL", 4.0).unwrap();
        assert_eq!(s.ledger().cash(), 0.0);
        assert_eq!(s.ledger().position("AAPL").quantity, 4.0);
    }

    #[test]
    fn sell_entire_position_resets_average() {
        let mut s = initialize(SessionConfig::classic()).unwrap();
        s.buy("TSLA", 3.0).unwrap();
        s.buy("TSLA", 2.0).unwrap();
        s.sell("TSLA", 5.0).unwrap();
        assert_eq!(s.ledger().position("TSLA").quantity, 0.0);
        assert_eq!(s.ledger().position("TSLA").average_cost, 0.0);
        assert!(s.view().positions.is_empty());
    }

    #[test]
    fn rejected_commands_leave_session_untouched() {
        let mut s = initialize(SessionConfig::classic()).unwrap();
        s.buy("AAPL", 2.0).unwrap();
        let before = s.view();

        assert!(matches!(s.buy("BITCOIN", 1.0), Err(EngineError::InsufficientFunds { .. })));
        assert!(matches!(s.sell("AAPL", 3.0), Err(EngineError::InsufficientHoldings { .. })));
        assert!(matches!(s.withdraw("POUPANCA", 1.0), Err(EngineError::InsufficientHoldings { .. })));
        assert!(matches!(s.deposit("POUPANCA", 1e9), Err(EngineError::InsufficientFunds { .. })));
        assert_eq!(s.buy("AAPL", 0.0), Err(EngineError::InvalidAmount(0.0)));
        assert!(matches!(s.sell("NOPE", 1.0), Err(EngineError::UnknownAsset(_))));

        assert_eq!(s.view(), before);
    }

    #[test]
    fn overflowing_noise_is_rejected_at_initialize() {
        let mut cfg = SessionConfig::arcade();
        if let PolicyConfig::MeanReverting(p) = &mut cfg.policy {
            p.noise = 1e308;
        }
        assert!(matches!(initialize(cfg), Err(EngineError::InvalidConfiguration(_))));
    }

    #[test]
    fn sub_cent_asset_is_rejected_at_initialize() {
        let mut cfg = SessionConfig::classic();
        cfg.assets = vec![AssetSpec::new("SHIB", AssetClass::Crypto, 0.005)];
        assert!(matches!(initialize(cfg), Err(EngineError::InvalidConfiguration(_))));
    }

    // ── History bound ─────────────────────────────────────────────────────────

    #[test]
    fn history_holds_latest_thirty_in_order() {
        let mut s = running(SessionConfig::classic().with_seed(8));
        let mut seen = Vec::new();
        for _ in 0..45 {
            s.tick();
            seen.push(s.price_of("AAPL").unwrap());
            let len = s.market().quote("AAPL").unwrap().history().len();
            assert!(len <= HISTORY_LEN);
        }

        let history: Vec<f64> = s.market().quote("AAPL").unwrap().history().iter().copied().collect();
        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(history, seen[seen.len() - HISTORY_LEN..].to_vec());
    }

    // ── Scenarios ─────────────────────────────────────────────────────────────

    #[test]
    fn classic_buy_and_sell_aapl() {
        let mut s = initialize(SessionConfig::classic()).unwrap();

        let buy = s.buy("AAPL", 10.0).unwrap();
        assert!((-buy.cash_delta() - 1501.5).abs() < 1e-9);
        assert!((s.ledger().cash() - 8498.5).abs() < 1e-9);
        assert_eq!(s.ledger().position("AAPL").quantity, 10.0);
        assert_eq!(s.ledger().position("AAPL").average_cost, 150.0);

        let sell = s.sell("AAPL", 10.0).unwrap();
        assert!((sell.cash_delta() - 1498.5).abs() < 1e-9);
        assert!((s.ledger().cash() - 9997.0).abs() < 1e-9);
    }

    #[test]
    fn classic_selic_compounds_after_twelve_ticks() {
        let mut s = running(SessionConfig::classic());
        s.deposit("TESOURO SELIC", 1000.0).unwrap();

        for i in 1..=11 {
            let report = s.tick().unwrap();
            assert!(!report.compounded, "compounded early at tick {i}");
        }
        assert_eq!(s.market().cycle(), 11);

        let report = s.tick().unwrap();
        assert!(report.compounded);
        assert!(report.news.unwrap().starts_with("Payday!"));
        assert_eq!(s.market().cycle(), 0);

        let balance = s.market().fixed_income("TESOURO SELIC").unwrap().balance;
        assert!((balance - 1010.2).abs() < 1e-9, "balance = {balance}");
        assert!(s.news().starts_with("Payday!"));
    }

    #[test]
    fn arcade_event_scales_tech_price() {
        let mut market = MarketState::from_config(&SessionConfig::arcade());
        assert_eq!(market.price_of("TECH").unwrap(), 15.0);

        let event = NewsEvent::new("TECH", 1.10, "TECH unveils a breakthrough chip");
        apply_event(&mut market, &event).unwrap();
        assert!((market.price_of("TECH").unwrap() - 16.5).abs() < 1e-9);
    }

    #[test]
    fn forced_event_tick_scales_tech_price() {
        let mut cfg = SessionConfig::arcade();
        if let PolicyConfig::MeanReverting(p) = &mut cfg.policy {
            p.noise = 0.0;
            p.bot_jump = 0.0;
            p.reversion = 0.0;
            p.event_probability = 1.0;
            p.events = vec![NewsEvent::new("TECH", 1.10, "TECH unveils a breakthrough chip")];
        }
        let policy = PricePolicy::from_config(&cfg).unwrap();
        let mut market = MarketState::from_config(&cfg);
        let mut rng = ChaCha8Rng::seed_from_u64(6);

        let report = market.tick(&policy, &mut rng);
        assert!((market.price_of("TECH").unwrap() - 16.5).abs() < 1e-9);
        assert_eq!(market.price_of("BANK").unwrap(), 22.0);
        assert_eq!(report.news.as_deref(), Some("TECH unveils a breakthrough chip"));
        let recorded = *market.quote("TECH").unwrap().history().back().unwrap();
        assert!((recorded - 16.5).abs() < 1e-9);
    }

    #[test]
    fn arcade_events_fire_roughly_five_percent_of_ticks() {
        let cfg = SessionConfig::arcade();
        let walk = match &cfg.policy {
            PolicyConfig::MeanReverting(p) => MeanRevertingWalk::new(p).unwrap(),
            other => panic!("unexpected policy {other:?}"),
        };
        let mut market = MarketState::from_config(&cfg);
        let mut rng = ChaCha8Rng::seed_from_u64(2024);

        let n = 20_000;
        let fired = (0..n)
            .filter(|_| walk.advance(&mut market, &mut rng).event.is_some())
            .count();
        let rate = fired as f64 / n as f64;
        assert!((rate - 0.05).abs() < 0.01, "event rate = {rate:.4}");
    }

    #[test]
    fn arcade_prices_revert_toward_baseline() {
        let mut s = running(SessionConfig::arcade().with_seed(1));
        for _ in 0..3_000 {
            s.tick();
        }
        for q in s.snapshot() {
            let baseline = s.market().quote(&q.asset).unwrap().baseline;
            assert!(
                (q.price / baseline - 1.0).abs() < 0.5,
                "{} drifted to {} from baseline {}",
                q.asset,
                q.price,
                baseline
            );
        }
    }

    // ── Determinism and reset ─────────────────────────────────────────────────

    #[test]
    fn same_seed_same_session() {
        let play = |seed: u64| {
            let mut s = running(SessionConfig::arcade().with_seed(seed));
            for i in 0..200 {
                s.tick();
                if i == 50 {
                    s.buy("BANK", 20.0).unwrap();
                }
            }
            s.view()
        };
        assert_eq!(play(11), play(11));
        assert_ne!(play(11).quotes, play(12).quotes);
    }

    #[test]
    fn reset_replays_identically() {
        let mut s = running(SessionConfig::classic().with_seed(3));
        for _ in 0..25 {
            s.tick();
        }
        let first = s.snapshot();

        s.reset();
        s.start();
        for _ in 0..25 {
            s.tick();
        }
        assert_eq!(s.snapshot(), first);
    }

    // ── Config files ──────────────────────────────────────────────────────────

    #[test]
    fn bundled_arcade_config_loads() {
        let cfg = SessionConfig::from_toml_str(include_str!("config/arcade.toml")).unwrap();
        assert_eq!(cfg.assets.len(), 3);
        assert!(cfg.fixed_income.is_empty());
        assert_eq!(cfg.cost_basis, CostBasis::IncludeFees);
        assert_eq!(cfg.assets[2].baseline(), 28.0);

        let s = initialize(cfg).unwrap();
        assert_eq!(s.policy().name(), "mean_reverting");
    }
}
