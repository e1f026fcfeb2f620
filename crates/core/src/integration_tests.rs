//! Integration tests: exercise the token-to-report pipeline against a
//! mock channel, for both protocol generations.

#[cfg(test)]
mod tests {
    use crate::args::{self, Action};
    use crate::channel::mock::MockChannel;
    use crate::channel::ReportChannel;
    use crate::device::{Generation, MouseModel, ProtocolVariant};
    use crate::error::{Error, Result};
    use crate::wheel::{self, BatteryState, ModeReport};

    const GEN1: ProtocolVariant = ProtocolVariant {
        leading: 1,
        generation: Generation::Generation1,
    };
    const GEN2: ProtocolVariant = ProtocolVariant {
        leading: 1,
        generation: Generation::Generation2,
    };

    /// The CLI dispatch loop, reduced to the arms the tests need:
    /// parse-and-apply one token at a time, stopping at the first error.
    fn apply_tokens(
        channel: &MockChannel,
        variant: ProtocolVariant,
        tokens: &[&str],
    ) -> Result<Vec<ModeReport>> {
        let mut reports = Vec::new();
        for token in tokens {
            match args::parse_token(token)? {
                Action::Set { mode, permanence } => {
                    wheel::set_mode(channel, variant, mode, permanence)?;
                }
                Action::QueryMode => reports.push(wheel::query_mode(channel, variant)?),
                Action::QueryBattery => {
                    wheel::query_battery(channel, variant)?;
                }
                Action::Raw { report_id, data } => channel.send(report_id, &data)?,
                _ => {}
            }
        }
        Ok(reports)
    }

    #[test]
    fn gen1_free_then_mode_round_trip() {
        let mock = MockChannel::new();
        // Firmware answer after switching to free spinning: mode bit clear.
        mock.push_response(vec![1, 0x81, 0x08, 0, 0, 0]);

        let reports = apply_tokens(&mock, GEN1, &["free", "mode"]).unwrap();
        assert_eq!(reports, vec![ModeReport::FreeSpinning]);

        let sent = mock.sent();
        assert_eq!(sent[0], (0x10, vec![1, 0x80, 0x56, 0x81, 0, 0]));
        assert_eq!(sent[1], (0x10, vec![1, 0x81, 0x08, 0, 0, 0]));
    }

    #[test]
    fn gen1_click_then_mode_round_trip() {
        let mock = MockChannel::new();
        mock.push_response(vec![1, 0x81, 0x08, 0, 0, 1]);

        let reports = apply_tokens(&mock, GEN1, &["click", "mode"]).unwrap();
        assert_eq!(reports, vec![ModeReport::ClickToClick]);
        assert_eq!(mock.sent()[0], (0x10, vec![1, 0x80, 0x56, 0x82, 0, 0]));
    }

    #[test]
    fn gen2_round_trip_echoes_the_set_command() {
        let mock = MockChannel::new();

        apply_tokens(&mock, GEN2, &["free"]).unwrap();
        // Generation2 firmware answers a mode query with the command it
        // last applied.
        let (_, applied) = mock.last_sent().unwrap();
        mock.push_response(applied);
        let reports = apply_tokens(&mock, GEN2, &["mode"]).unwrap();
        assert_eq!(reports, vec![ModeReport::FreeSpinning]);

        apply_tokens(&mock, GEN2, &["temp-click"]).unwrap();
        let (_, applied) = mock.last_sent().unwrap();
        mock.push_response(applied);
        let reports = apply_tokens(&mock, GEN2, &["mode"]).unwrap();
        assert_eq!(reports, vec![ModeReport::ClickToClick]);
    }

    #[test]
    fn gen2_auto_parameters_echo_back() {
        let mock = MockChannel::new();
        apply_tokens(&mock, GEN2, &["auto=10,20"]).unwrap();
        let (_, applied) = mock.last_sent().unwrap();
        assert_eq!(applied, vec![1, 0x80, 0x56, 0x85, 10, 20]);

        mock.push_response(applied);
        let reports = apply_tokens(&mock, GEN2, &["mode"]).unwrap();
        assert_eq!(reports, vec![ModeReport::AutoSwitch { up: 10, down: 20 }]);
    }

    #[test]
    fn manual_packing_diverges_between_generations() {
        let gen1 = MockChannel::new();
        apply_tokens(&gen1, GEN1, &["manual=3,5"]).unwrap();
        assert_eq!(gen1.last_sent().unwrap().1[3..], [0x87, 0x35, 0][..]);

        let gen2 = MockChannel::new();
        apply_tokens(&gen2, GEN2, &["manual=3,5"]).unwrap();
        assert_eq!(gen2.last_sent().unwrap().1[3..], [0x87, 3, 5][..]);

        // Equal buttons use the single-toggle opcode either way.
        let single = MockChannel::new();
        apply_tokens(&single, GEN2, &["manual=3"]).unwrap();
        assert_eq!(single.last_sent().unwrap().1[3..], [0x88, 3, 0][..]);
    }

    #[test]
    fn battery_query_flow() {
        let mock = MockChannel::new();
        mock.push_response(vec![1, 0x81, 0x0D, 42, 0x50, 0]);

        let report = wheel::query_battery(&mock, GEN1).unwrap();
        assert_eq!(report.percent, 42);
        assert_eq!(report.state, BatteryState::Charging);
        assert_eq!(mock.last_sent().unwrap().1, vec![1, 0x81, 0x0D, 0, 0, 0]);
    }

    #[test]
    fn bad_token_halts_before_any_send() {
        let mock = MockChannel::new();
        let err = apply_tokens(&mock, GEN1, &["manual=16"]).unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
        assert_eq!(mock.sent_count(), 0);
    }

    #[test]
    fn earlier_tokens_are_applied_before_the_bad_one_aborts() {
        let mock = MockChannel::new();
        let err = apply_tokens(&mock, GEN1, &["free", "foo", "click"]).unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
        // `free` already went out; `click` never did.
        assert_eq!(mock.sent(), vec![(0x10, vec![1, 0x80, 0x56, 0x81, 0, 0])]);
    }

    #[test]
    fn bad_answer_degrades_that_query_only() {
        let mock = MockChannel::new();
        mock.push_response(vec![0xFF, 0xEE, 0xDD, 0, 0, 0]);
        mock.push_response(vec![1, 0x81, 0x0D, 90, 0x90, 0]);

        // First query fails validation but is recoverable.
        assert!(matches!(
            wheel::query_mode(&mock, GEN1),
            Err(Error::BadAnswer { .. })
        ));
        // The next token still reaches the device and decodes.
        let report = wheel::query_battery(&mock, GEN1).unwrap();
        assert_eq!(report.state, BatteryState::FullyCharged);
    }

    #[test]
    fn reconnect_sends_the_fixed_frame_then_waits() {
        let mock = MockChannel::new();
        // The dispatcher's reconnect arm: send, then give the mouse a
        // minute to re-pair.
        wheel::reconnect(&mock).unwrap();
        mock.drain(wheel::RECONNECT_WAIT_MS);

        assert_eq!(
            mock.last_sent(),
            Some((0x10, vec![0xFF, 0x80, 0xB2, 1, 0, 0]))
        );
        assert_eq!(mock.drains(), vec![60_000]);
    }

    #[test]
    fn raw_token_reaches_the_channel_verbatim() {
        let mock = MockChannel::new();
        apply_tokens(&mock, GEN1, &["raw=0x20,1,2,3,4"]).unwrap();
        assert_eq!(mock.last_sent(), Some((0x20, vec![1, 2, 3, 4])));
    }

    #[test]
    fn combo_variant_flows_through_encoding() {
        let mock = MockChannel::new();
        let variant = MouseModel::Mx5500.variant();
        apply_tokens(&mock, variant, &["temp-free"]).unwrap();
        assert_eq!(mock.last_sent().unwrap().1, vec![2, 0x80, 0x56, 1, 0, 0]);
    }
}
