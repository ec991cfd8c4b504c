// Tests for whole canonical call sequences and the messages they queue

#[cfg(test)]
mod tests {
    use canon_rs::canon::{ArcCommand, ControlPoint, MotionMode, MotionType, Plane};
    use canon_rs::{Canon, CanonSettings, QueuedMessage, TrajMessage};
    use canon_shared::{Cartesian, Pose};
    use std::fs;
    use tempfile::tempdir;

    fn create_session(tolerance: f64) -> Canon {
        let settings = CanonSettings {
            naivecam_tolerance: tolerance,
            ..CanonSettings::default()
        };
        let mut canon = Canon::new(settings);
        canon.init_canon();
        canon.drain();
        canon
    }

    fn kinds(queued: &[QueuedMessage]) -> Vec<&'static str> {
        queued.iter().map(|q| q.message.kind()).collect()
    }

    fn linear_end(message: &TrajMessage) -> Pose {
        match message {
            TrajMessage::LinearMove { end, .. } => *end,
            other => panic!("expected a linear move, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_tolerance_emits_every_feed() {
        let mut canon = create_session(0.0);
        canon.set_feed_rate(600.0);
        for (line, x) in [(1, 1.0), (2, 2.0), (3, 3.0)] {
            canon.straight_feed(line, &Pose::xyz(x, 0.0, 0.0));
        }
        canon.finish();
        let queued = canon.drain();
        assert_eq!(kinds(&queued), vec!["linear_move"; 3]);
        let lines: Vec<i32> = queued.iter().map(|q| q.line_number).collect();
        assert_eq!(lines, vec![1, 2, 3]);
        match &queued[0].message {
            TrajMessage::LinearMove { vel, motion_type, .. } => {
                assert_eq!(*motion_type, MotionType::Feed);
                assert!((vel - 10.0).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_collinear_feeds_coalesce() {
        let mut canon = create_session(0.01);
        canon.set_feed_rate(600.0);
        canon.straight_feed(10, &Pose::xyz(1.0, 0.0, 0.0));
        canon.straight_feed(11, &Pose::xyz(2.0, 0.001, 0.0));
        canon.straight_feed(12, &Pose::xyz(3.0, 0.0, 0.0));
        assert_eq!(canon.pending_segments(), 3);
        canon.finish();
        let queued = canon.drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].line_number, 12);
        assert_eq!(linear_end(&queued[0].message), Pose::xyz(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_corner_breaks_the_chain() {
        let mut canon = create_session(0.01);
        canon.set_feed_rate(600.0);
        canon.straight_feed(1, &Pose::xyz(5.0, 0.0, 0.0));
        canon.straight_feed(2, &Pose::xyz(5.0, 5.0, 0.0));
        canon.finish();
        let queued = canon.drain();
        assert_eq!(queued.len(), 2);
        assert_eq!(linear_end(&queued[0].message), Pose::xyz(5.0, 0.0, 0.0));
        assert_eq!(linear_end(&queued[1].message), Pose::xyz(5.0, 5.0, 0.0));
    }

    #[test]
    fn test_exact_stop_disables_chaining() {
        let mut canon = create_session(0.01);
        canon.set_motion_control_mode(MotionMode::ExactStop, 0.0);
        canon.set_feed_rate(600.0);
        canon.drain();
        canon.straight_feed(1, &Pose::xyz(1.0, 0.0, 0.0));
        canon.straight_feed(2, &Pose::xyz(2.0, 0.0, 0.0));
        canon.finish();
        assert_eq!(canon.drain().len(), 2);
    }

    #[test]
    fn test_zero_length_feed_after_traverse_is_dropped() {
        let mut canon = create_session(0.0);
        canon.set_feed_rate(600.0);
        canon.straight_traverse(1, &Pose::xyz(10.0, 0.0, 0.0));
        canon.straight_feed(2, &Pose::xyz(10.0, 0.0, 0.0));
        canon.finish();
        let queued = canon.drain();
        assert_eq!(queued.len(), 1);
        match &queued[0].message {
            TrajMessage::LinearMove { motion_type, end, .. } => {
                assert_eq!(*motion_type, MotionType::Traverse);
                assert_eq!(*end, Pose::xyz(10.0, 0.0, 0.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_full_circle() {
        let mut canon = create_session(0.0);
        canon.set_feed_rate(600.0);
        let arc = ArcCommand {
            first_end: 0.0,
            second_end: 0.0,
            first_axis: 5.0,
            second_axis: 0.0,
            rotation: 1,
            ..ArcCommand::default()
        };
        canon.arc_feed(7, &arc);
        let queued = canon.drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].line_number, 7);
        match &queued[0].message {
            TrajMessage::CircularMove {
                end,
                center,
                normal,
                turn,
                vel,
                acc,
                motion_type,
                ..
            } => {
                assert_eq!(*end, Pose::ZERO);
                assert_eq!(*center, Cartesian::new(5.0, 0.0, 0.0));
                assert_eq!(*normal, Cartesian::new(0.0, 0.0, 1.0));
                assert_eq!(*turn, 0);
                assert_eq!(*motion_type, MotionType::Arc);
                assert!(*vel > 0.0 && *vel <= 10.0 + 1e-9);
                assert!(*acc > 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(canon.end_point(), Pose::ZERO);
    }

    #[test]
    fn test_shallow_arc_is_linearized() {
        let mut canon = create_session(0.1);
        canon.set_feed_rate(600.0);
        let arc = ArcCommand {
            first_end: 1.0,
            second_end: 0.0,
            first_axis: 0.5,
            second_axis: -10.0,
            rotation: -1,
            ..ArcCommand::default()
        };
        canon.arc_feed(3, &arc);
        assert_eq!(canon.pending_segments(), 2);
        canon.finish();
        let queued = canon.drain();
        assert_eq!(queued.len(), 1);
        match &queued[0].message {
            TrajMessage::LinearMove { end, motion_type, .. } => {
                assert_eq!(*motion_type, MotionType::Feed);
                assert!(end.approx_eq(&Pose::xyz(1.0, 0.0, 0.0), 1e-9));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_arc_outside_xy_is_never_linearized() {
        let mut canon = create_session(0.1);
        canon.set_feed_rate(600.0);
        canon.select_plane(Plane::XZ);
        let arc = ArcCommand {
            first_end: 0.0,
            second_end: 1.0,
            first_axis: -10.0,
            second_axis: 0.5,
            rotation: 1,
            ..ArcCommand::default()
        };
        canon.arc_feed(3, &arc);
        assert_eq!(canon.pending_segments(), 0);
        let queued = canon.drain();
        assert_eq!(queued.len(), 1);
        match &queued[0].message {
            TrajMessage::CircularMove { normal, .. } => assert_eq!(*normal, Cartesian::new(0.0, 1.0, 0.0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_offset_change_flushes_buffered_feeds_first() {
        let mut canon = create_session(0.01);
        canon.set_feed_rate(600.0);
        canon.straight_feed(1, &Pose::xyz(1.0, 0.0, 0.0));
        canon.straight_feed(2, &Pose::xyz(2.0, 0.0, 0.0));
        canon.set_g92_offset(&Pose::xyz(0.0, 0.0, 5.0));
        let queued = canon.drain();
        assert_eq!(kinds(&queued), vec!["linear_move", "set_g92"]);
        assert_eq!(linear_end(&queued[0].message), Pose::xyz(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_offsets_and_rotation_shape_targets() {
        let mut canon = create_session(0.0);
        canon.set_g5x_offset(1, &Pose::xyz(10.0, 0.0, 0.0));
        canon.set_xy_rotation(90.0);
        canon.drain();
        canon.straight_traverse(1, &Pose::xyz(1.0, 0.0, 0.0));
        let queued = canon.drain();
        assert!(linear_end(&queued[0].message).approx_eq(&Pose::xyz(10.0, 1.0, 0.0), 1e-9));
        // The interpreter sees its own coordinates back.
        let program = canon.external_position(&Pose::xyz(10.0, 1.0, 0.0));
        assert!(program.approx_eq(&Pose::xyz(1.0, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn test_line_numbers_never_decrease() {
        let mut canon = create_session(0.05);
        canon.set_feed_rate(1200.0);
        canon.straight_traverse(1, &Pose::xyz(0.0, 0.0, 5.0));
        canon.start_spindle_clockwise();
        for line in 2..40 {
            let x = line as f64;
            let y = if line % 7 == 0 { 1.0 } else { 0.0 };
            canon.straight_feed(line, &Pose::xyz(x, y, 5.0));
        }
        canon.dwell(0.5);
        canon.arc_feed(
            41,
            &ArcCommand {
                first_end: 39.0,
                second_end: 10.0,
                first_axis: 39.0,
                second_axis: 5.0,
                rotation: 1,
                axis_end_point: 5.0,
                ..ArcCommand::default()
            },
        );
        canon.program_end();
        let queued = canon.drain();
        assert!(queued.len() > 3);
        assert!(queued.windows(2).all(|w| w[0].line_number <= w[1].line_number));
        assert_eq!(queued.last().map(|q| q.message.kind()), Some("plan_end"));
    }

    #[test]
    fn test_traverse_restarts_spindle_synchronization() {
        let mut canon = create_session(0.0);
        canon.set_feed_mode(true);
        canon.set_feed_rate(0.5);
        canon.straight_traverse(1, &Pose::xyz(0.0, 0.0, 10.0));
        let queued = canon.drain();
        assert_eq!(
            kinds(&queued),
            vec!["spindle_sync", "spindle_sync", "linear_move", "spindle_sync"]
        );
        assert_eq!(
            queued.last().map(|q| &q.message),
            Some(&TrajMessage::SpindleSync {
                feed_per_revolution: 0.5,
                velocity_mode: true
            })
        );
        assert!(canon.is_synchronized());
    }

    #[test]
    fn test_stop_sync_keeps_the_line_it_ends() {
        let mut canon = create_session(0.0);
        canon.set_feed_mode(true);
        canon.set_feed_rate(0.5);
        canon.straight_feed(4, &Pose::xyz(2.0, 0.0, 0.0));
        canon.drain();
        canon.straight_traverse(5, &Pose::xyz(2.0, 0.0, 10.0));
        let queued = canon.drain();
        assert_eq!(
            kinds(&queued),
            vec!["linear_move", "spindle_sync", "linear_move", "spindle_sync"]
        );
        let lines: Vec<i32> = queued.iter().map(|q| q.line_number).collect();
        assert_eq!(lines, vec![4, 4, 5, 5]);
    }

    #[test]
    fn test_synchronized_zero_length_feed_is_queued() {
        let mut canon = create_session(0.0);
        canon.set_feed_mode(true);
        canon.set_feed_rate(0.5);
        canon.drain();
        canon.straight_feed(3, &Pose::ZERO);
        canon.finish();
        let queued = canon.drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].line_number, 3);
        match &queued[0].message {
            TrajMessage::LinearMove { feed_per_revolution, motion_type, .. } => {
                assert!(*feed_per_revolution);
                assert_eq!(*motion_type, MotionType::Feed);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_long_collinear_run_splits_at_chain_limit() {
        let mut canon = create_session(0.01);
        canon.set_feed_rate(600.0);
        for line in 1..=105 {
            canon.straight_feed(line, &Pose::xyz(line as f64, 0.0, 0.0));
        }
        assert_eq!(canon.pending_segments(), 4);
        canon.finish();
        let queued = canon.drain();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].line_number, 101);
        assert_eq!(linear_end(&queued[0].message), Pose::xyz(101.0, 0.0, 0.0));
        assert_eq!(queued[1].line_number, 105);
        assert_eq!(linear_end(&queued[1].message), Pose::xyz(105.0, 0.0, 0.0));
    }

    #[test]
    fn test_nurbs_reaches_last_control_point() {
        let mut canon = create_session(0.0);
        canon.set_feed_rate(600.0);
        let points = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]
            .map(|(x, y)| ControlPoint { x, y, weight: 1.0 });
        canon.nurbs_feed(9, &points, 3);
        canon.finish();
        let queued = canon.drain();
        assert!(!queued.is_empty());
        assert!(queued.iter().all(|q| q.message.is_motion() && q.line_number == 9));
        let end = canon.end_point();
        assert!((end.x - 0.0).abs() < 1e-6 && (end.y - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_nurbs_is_ignored() {
        let mut canon = create_session(0.0);
        canon.set_feed_rate(600.0);
        canon.nurbs_feed(1, &[ControlPoint { x: 1.0, y: 1.0, weight: 1.0 }], 3);
        assert!(canon.drain().is_empty());
        assert_eq!(canon.end_point(), Pose::ZERO);
    }

    #[test]
    fn test_probe_results_are_recorded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("probe.txt");
        let mut canon = create_session(0.0);
        canon.comment(&format!("PROBEOPEN {}", path.display()));
        canon.turn_probe_on();
        canon.straight_probe(1, &Pose::xyz(0.0, 0.0, -20.0), 2);
        canon.external_probe_position(&Pose::xyz(0.0, 0.0, -12.5));
        canon.external_probe_position(&Pose::xyz(0.0, 0.0, -12.5));
        canon.external_probe_position(&Pose::xyz(1.0, 0.0, -12.0));
        canon.comment("PROBECLOSE");

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split_whitespace().count(), 9);
        assert!(lines[0].starts_with("0.000000 0.000000 -12.500000"));
        assert_eq!(kinds(&canon.drain())[0], "clear_probe_tripped");
    }

    #[test]
    fn test_unwritable_probe_file_reports_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("probe.txt");
        let mut canon = create_session(0.0);
        canon.comment(&format!("PROBEOPEN {}", path.display()));
        assert_eq!(kinds(&canon.drain()), vec!["operator_error"]);
    }

    #[test]
    fn test_tool_change_moves_to_configured_position() {
        let settings = CanonSettings {
            tool_change_position: Some(Pose::xyz(0.0, 0.0, 50.0)),
            ..CanonSettings::default()
        };
        let mut canon = Canon::new(settings);
        canon.init_canon();
        canon.drain();
        canon.select_pocket(4, 12);
        canon.start_change();
        canon.change_tool(4);
        canon.change_tool_number(12);
        let queued = canon.drain();
        assert_eq!(
            kinds(&queued),
            vec!["tool_prepare", "tool_start_change", "linear_move", "tool_load", "tool_set_number"]
        );
        match &queued[2].message {
            TrajMessage::LinearMove { motion_type, end, .. } => {
                assert_eq!(*motion_type, MotionType::ToolChange);
                assert_eq!(*end, Pose::xyz(0.0, 0.0, 50.0));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(canon.end_point(), Pose::xyz(0.0, 0.0, 50.0));
    }
}
