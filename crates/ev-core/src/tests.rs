//! Unit tests for ev-core primitives.

#[cfg(test)]
mod ids {
    use crate::{AgentId, JourneyId, RunId, StageId};

    #[test]
    fn index_roundtrip() {
        let id = StageId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(StageId::try_from(42usize).unwrap(), id);
    }

    #[test]
    fn invalid_sentinels_are_max() {
        assert_eq!(AgentId::INVALID.0, u64::MAX);
        assert_eq!(StageId::INVALID.0, u32::MAX);
        assert_eq!(JourneyId::default(), JourneyId::INVALID);
    }

    #[test]
    fn display() {
        assert_eq!(AgentId(7).to_string(), "AgentId(7)");
    }

    #[test]
    fn run_id_parses_its_display() {
        let id = RunId::new_v4();
        let parsed: RunId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}

#[cfg(test)]
mod geo {
    use crate::{CoreError, Point, Polygon};

    fn unit_square() -> Polygon {
        Polygon::rectangle(Point::new(0.0, 0.0), Point::new(1.0, 1.0))
    }

    #[test]
    fn contains_inside_and_outside() {
        let sq = unit_square();
        assert!(sq.contains(Point::new(0.5, 0.5)));
        assert!(!sq.contains(Point::new(1.5, 0.5)));
        assert!(!sq.contains(Point::new(-0.1, 0.5)));
    }

    #[test]
    fn holes_are_excluded() {
        let outer = Polygon::rectangle(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let hole = Polygon::rectangle(Point::new(4.0, 4.0), Point::new(6.0, 6.0));
        let area = Polygon::with_holes(outer.exterior, vec![hole.exterior]).unwrap();
        assert!(area.contains(Point::new(1.0, 1.0)));
        assert!(!area.contains(Point::new(5.0, 5.0)));
        assert!((area.area() - 96.0).abs() < 1e-9);
        // Distance to the hole edge counts as boundary distance.
        assert!((area.boundary_distance(Point::new(3.0, 5.0)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn distance_is_zero_inside() {
        let sq = unit_square();
        assert_eq!(sq.distance(Point::new(0.5, 0.5)), 0.0);
        assert!((sq.distance(Point::new(3.0, 0.5)) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn centroid_of_rectangle() {
        let r = Polygon::rectangle(Point::new(2.0, 0.0), Point::new(4.0, 2.0));
        let c = r.centroid();
        assert!((c.x - 3.0).abs() < 1e-9 && (c.y - 1.0).abs() < 1e-9, "got {c}");
    }

    #[test]
    fn wkt_closes_rings() {
        assert_eq!(
            unit_square().to_wkt(),
            "POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))"
        );
    }

    #[test]
    fn degenerate_rings_rejected() {
        let err = Polygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]).unwrap_err();
        assert!(matches!(err, CoreError::DegeneratePolygon(2)));

        let err = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(f64::NAN, 0.0),
            Point::new(1.0, 1.0),
        ])
        .unwrap_err();
        assert!(matches!(err, CoreError::NonFiniteCoordinate { index: 1, .. }));
    }

    #[test]
    fn point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(1.5, -2.0)).unwrap();
        assert_eq!(json, "[1.5,-2.0]");
        let back: Point = serde_json::from_str("[3, 4]").unwrap();
        assert_eq!(back, Point::new(3.0, 4.0));
    }
}

#[cfg(test)]
mod rng {
    use crate::SimRng;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SimRng::new(9);
        let mut b = SimRng::new(9);
        for _ in 0..16 {
            assert_eq!(a.random::<u64>(), b.random::<u64>());
        }
    }

    #[test]
    fn derived_streams_differ() {
        let mut a = SimRng::derive(420, 0);
        let mut b = SimRng::derive(420, 1);
        assert_ne!(a.random::<u64>(), b.random::<u64>());
    }

    #[test]
    fn normal_has_roughly_the_requested_mean() {
        let mut rng = SimRng::new(3);
        let n = 5_000;
        let mean = (0..n).map(|_| rng.normal(1.2, 0.26)).sum::<f64>() / n as f64;
        assert!((mean - 1.2).abs() < 0.02, "mean {mean}");
    }
}

#[cfg(test)]
mod params {
    use crate::{CoreError, ModelType, RunParameters};

    #[test]
    fn defaults_validate() {
        let p = RunParameters::default();
        p.validate().unwrap();
        assert_eq!(p.planned_ticks(), 30_000);
        assert_eq!(p.seed_for(3), 423);
    }

    #[test]
    fn simulation_count_bounded() {
        let p = RunParameters { number_of_simulations: 11, ..RunParameters::default() };
        assert!(matches!(
            p.validate(),
            Err(CoreError::InvalidParameter { field: "number_of_simulations", .. })
        ));
        let p = RunParameters { number_of_simulations: 0, ..RunParameters::default() };
        assert!(p.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let p: RunParameters = serde_json::from_str(
            r#"{"max_simulation_time": 60, "model": {"model_type": "SocialForceModel"}}"#,
        )
        .unwrap();
        assert_eq!(p.max_simulation_time, 60.0);
        assert_eq!(p.base_seed, 420);
        assert_eq!(p.model.model_type, ModelType::SocialForceModel);
        assert_eq!(p.model.strength_neighbor_repulsion, 2.6);
    }

    #[test]
    fn force_model_keys_are_dropped_on_load() {
        let p: RunParameters = serde_json::from_str(
            r#"{"model": {"model_type": "GeneralizedCentrifugalForceModel",
                          "mass": 80, "tau": 0.5, "time_gap": 0.8}}"#,
        )
        .unwrap();
        assert_eq!(p.model.model_type, ModelType::GeneralizedCentrifugalForceModel);
        assert_eq!(p.model.time_gap, 0.8);
        assert_eq!(p.model.range_neighbor_repulsion, 0.1);
        let echoed = serde_json::to_value(&p.model).unwrap();
        assert!(echoed.get("mass").is_none());
        assert!(echoed.get("tau").is_none());
    }
}
