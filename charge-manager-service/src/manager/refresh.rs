use super::*;

/// A supplier on a port that could be charged from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(super) struct Candidate {
    pub port: PortId,
    pub supplier: ChargeSupplier,
    /// mA * mV
    pub power: u32,
}

impl<const N: usize> ChargeManager<N> {
    /// Pick the port and supplier to charge from.
    ///
    /// Supplier priority decides first, then power, then staying on the active port. A dual-role
    /// partner is only used when it is the override port, which in turn wins over everything.
    pub(super) fn best_charge_port(&self) -> Option<Candidate> {
        if self.override_port == Override::DontCharge {
            return None;
        }

        let override_port = self.override_port.port();
        let mut best: Option<Candidate> = None;
        for supplier in ChargeSupplier::ALL {
            for (index, info) in self.available[supplier.index()].iter().enumerate() {
                let Some(info) = info.filter(ChargePortInfo::is_available) else {
                    continue;
                };
                let port = PortId(index as u8);

                // Nothing else competes with charge on the override port
                if override_port.is_some() && best.map(|best| best.port) == override_port && override_port != Some(port)
                {
                    continue;
                }

                if self.dualrole[index] != DualRoleCapability::Dedicated && override_port != Some(port) {
                    continue;
                }

                let candidate = Candidate {
                    port,
                    supplier,
                    power: info.power(),
                };
                best = match best {
                    None => Some(candidate),
                    Some(current) if self.prefer(&candidate, &current) => Some(candidate),
                    Some(_) => best,
                };
            }
        }

        best
    }

    fn prefer(&self, candidate: &Candidate, current: &Candidate) -> bool {
        let priority = self.config.priority(candidate.supplier);
        let current_priority = self.config.priority(current.supplier);
        let override_port = self.override_port.port();

        priority < current_priority
            || (override_port == Some(candidate.port) && override_port != Some(current.port))
            || (priority == current_priority
                && (candidate.power > current.power
                    || (candidate.power == current.power && self.active.port == Some(candidate.port))))
    }

    /// Select the charge port and apply it to the board.
    ///
    /// Runs as a deferred call. Calling it again without new input changes nothing.
    pub(crate) fn refresh<H: Platform>(&mut self, hal: &mut H) {
        let best = loop {
            let best = self.best_charge_port();
            let port = best.map(|best| best.port);
            if port == self.active.port && best.map(|best| best.supplier) == self.active.supplier {
                break best;
            }

            match (hal.set_active_charge_port(port), port) {
                (Ok(()), _) => break best,
                (Err(e), None) => {
                    error!("Board refused to stop charging: {:?}", e);
                    break best;
                }
                (Err(e), Some(rejected)) => {
                    warn!("Board rejected charge port {}: {:?}", rejected.0, e);
                    // Keep the rejected port out of the next round
                    for supplier in self.available.iter_mut() {
                        if let Some(info) = supplier[rejected.index()].as_mut() {
                            info.current_ma = 0;
                        }
                    }
                }
            }
        };
        let new_port = best.map(|best| best.port);

        // An override that was not selected has no charge or was rejected
        if let Some(port) = self.override_port.port() {
            if Some(port) != new_port {
                info!("Override port {} not usable, clearing", port.0);
                self.cleanup_override_port(hal, Some(port));
                self.override_port = Override::Off;
            }
        }

        let (current_ma, current_uncapped_ma, voltage_mv) = match best {
            Some(best) => {
                let info = self.available[best.supplier.index()][best.port.index()].unwrap_or_default();
                let capped = match self.ceil[best.port.index()] {
                    Some(ceil) => ceil.min(info.current_ma),
                    None => info.current_ma,
                };
                (capped, info.current_ma, info.voltage_mv)
            }
            None => (0, 0, 0),
        };
        let new_supplier = best.map(|best| best.supplier);

        if new_port != self.active.port
            || Some(current_ma) != self.active.current_ma
            || new_supplier != self.active.supplier
        {
            hal.set_charge_limit(current_ma);
            info!(
                "CL: p{:?} s{:?} i{} v{}",
                new_port.map(|port| port.0),
                new_supplier,
                current_ma,
                voltage_mv
            );
        }

        // The ceiling alone does not change what the partner is asked for
        let updated_new_port = new_port.filter(|&port| {
            Some(port) != self.active.port
                || Some(current_uncapped_ma) != self.active.current_uncapped_ma
                || voltage_mv != self.active.voltage_mv
        });
        let updated_old_port = self.active.port.filter(|&port| Some(port) != new_port);

        self.active = Active {
            port: new_port,
            supplier: new_supplier,
            current_ma: Some(current_ma),
            current_uncapped_ma: Some(current_uncapped_ma),
            voltage_mv,
        };

        match (updated_new_port, self.active.port) {
            (Some(port), _) => self.save_log[port.index()] = true,
            (None, Some(port)) => self.save_log[port.index()] = false,
            (None, None) => (),
        }
        if let Some(port) = updated_old_port {
            self.save_log[port.index()] = true;
        }
        for index in 0..N {
            if self.save_log[index] {
                self.write_log(hal, PortId(index as u8));
            }
        }

        // State is final before the PD stack is told to renegotiate
        if let Some(port) = updated_new_port {
            hal.set_new_power_request(port);
        }
        if let Some(port) = updated_old_port {
            hal.set_new_power_request(port);
        }
    }
}
