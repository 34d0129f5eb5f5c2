//! Bundled demo designs.
//!
//! Each design is a small but complete circuit exercising one area of the
//! compiler: plain synchronous logic, a state machine, a memory with mixed
//! port kinds, and a clock-domain crossing that must be lowered.

use clap::ValueEnum;
use kiln_elaborate::{Fsm, Module};
use kiln_ir::{
    ClockDomain, ElabResult, If, Memory, MultiReg, PortSpec, Signal, Statement, ValueOps,
};

/// A design together with its top-level ports.
pub struct Design {
    /// The top module.
    pub module: Module,
    /// Signals exposed as ports, in declaration order.
    pub ios: Vec<Signal>,
}

/// The designs `kiln demo` knows how to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DemoDesign {
    /// An enabled up-counter.
    Counter,
    /// An LED toggled by a two-state FSM and a reload timer.
    Blinker,
    /// A small RAM with a byte-lane write port and a gated read port.
    Memory,
    /// A value synchronized into a second clock domain.
    Cdc,
}

impl DemoDesign {
    /// Builds the design.
    pub fn build(self) -> ElabResult<Design> {
        match self {
            DemoDesign::Counter => Ok(counter(8)),
            DemoDesign::Blinker => blinker(4),
            DemoDesign::Memory => memory(),
            DemoDesign::Cdc => Ok(cdc(2)),
        }
    }

    /// The module name used when the configuration keeps the default.
    pub fn module_name(self) -> &'static str {
        match self {
            DemoDesign::Counter => "counter",
            DemoDesign::Blinker => "blinker",
            DemoDesign::Memory => "ram",
            DemoDesign::Cdc => "cdc",
        }
    }
}

/// A `width`-bit counter that advances while `enable` is high.
pub fn counter(width: u32) -> Design {
    let enable = Signal::new("enable", 1);
    let count = Signal::new("count", width);
    let mut module = Module::new("counter");
    module.add_sync(
        "sys",
        [If::new(&enable, [count.clone().assign(&count + 1)]).into()],
    );
    Design {
        module,
        ios: vec![enable, count],
    }
}

/// An LED that spends `period` cycles on and `period` cycles off.
pub fn blinker(period: u32) -> ElabResult<Design> {
    let led = Signal::new("led", 1);
    let timer = Signal::range("timer", 0, period.max(1));
    let expired = Signal::new("expired", 1);

    let mut fsm = Fsm::new("blink");
    fsm.act(
        "OFF",
        [If::new(&expired, [Statement::next_state("ON")]).into()],
    );
    fsm.act(
        "ON",
        [
            led.clone().assign(1),
            If::new(&expired, [Statement::next_state("OFF")]).into(),
        ],
    );

    let mut module = Module::new("blinker");
    module.add_comb([expired.clone().assign((&timer).cmp_eq(0))]);
    module.add_sync(
        "sys",
        [If::new(&expired, [timer.clone().assign(period.saturating_sub(1))])
            .otherwise([timer.clone().assign(&timer - 1)])
            .into()],
    );
    module.add_submodule(Some("fsm"), fsm)?;
    Ok(Design {
        module,
        ios: vec![led],
    })
}

/// A 16 x 8 RAM preloaded with its own addresses.
pub fn memory() -> ElabResult<Design> {
    let mut mem = Memory::new("ram", 8, 16).with_init(0u32..16);
    let write = mem.add_port(PortSpec::write("w").we_granularity(4))?;
    let read = mem.add_port(PortSpec::read("r").with_re())?;

    let mut ios = vec![write.adr.clone()];
    ios.extend(write.dat_w.clone());
    ios.extend(write.we.clone());
    ios.push(read.adr.clone());
    ios.extend(read.re.clone());
    ios.push(read.dat_r.clone());

    let mut module = Module::new("ram");
    module.add_special(mem);
    Ok(Design { module, ios })
}

/// A registered value carried into the `pix` domain through a `stages`-flop
/// synchronizer.
pub fn cdc(stages: u32) -> Design {
    let din = Signal::new("din", 4);
    let staged = Signal::new("staged", 4);
    let dout = Signal::new("dout", 4);

    let mut module = Module::new("cdc");
    module.add_clock_domain(ClockDomain::new("sys"));
    module.add_clock_domain(ClockDomain::new("pix"));
    module.add_sync("sys", [staged.clone().assign(&din)]);
    module.add_special(MultiReg {
        input: staged.into(),
        output: dout.clone(),
        odomain: "pix".into(),
        stages,
    });
    Design {
        module,
        ios: vec![din, dout],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::KilnConfig;
    use kiln_lower::SpecialOverrides;
    use kiln_verilog::convert;

    fn emit(design: DemoDesign) -> kiln_verilog::ConvertOutput {
        let d = design.build().unwrap();
        convert(d.module, &d.ios, &SpecialOverrides::generic(), &KilnConfig::default()).unwrap()
    }

    #[test]
    fn every_demo_converts() {
        for design in DemoDesign::value_variants() {
            let out = emit(*design);
            assert!(out.source.ends_with("endmodule\n"), "{design:?}");
        }
    }

    #[test]
    fn counter_ports() {
        let out = emit(DemoDesign::Counter);
        assert_eq!(out.port_names(), vec!["enable", "count", "sys_clk", "sys_rst"]);
    }

    #[test]
    fn memory_exposes_lane_enables() {
        let d = memory().unwrap();
        let we = d.ios.iter().find(|s| s.name() == "ram_w_we").unwrap();
        assert_eq!(we.width(), 2);
    }

    #[test]
    fn cdc_has_no_abstract_specials_left() {
        let out = emit(DemoDesign::Cdc);
        assert!(out.source.contains("pix_clk"));
        assert!(!out.source.contains("MultiReg"));
    }

    #[test]
    fn blinker_timer_fits_period() {
        let d = blinker(4).unwrap();
        assert_eq!(d.ios.len(), 1);
        let out = convert(
            d.module,
            &d.ios,
            &SpecialOverrides::generic(),
            &KilnConfig::default(),
        )
        .unwrap();
        assert!(out.source.contains("timer"));
    }
}
