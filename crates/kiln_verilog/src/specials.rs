//! Emitting the specials a back end understands natively.

use crate::buffer::Buffer;
use crate::emit::Emitter;
use crate::expr::shape_prefix;
use crate::output::DataFile;
use kiln_config::MemoryInitStyle;
use kiln_ir::special::{Instance, InstanceItem, ParamValue, SpecialKind, SynthesisDirective, Tristate};
use kiln_ir::{ElabError, ElabResult, Memory, MemoryPort, Shape, Special, WriteMode};
use num_bigint::BigInt;

impl Emitter<'_> {
    /// Emits one special, failing on kinds that should have been lowered.
    pub(crate) fn special(&mut self, buf: &mut Buffer, special: &Special) -> ElabResult<()> {
        match &special.kind {
            SpecialKind::Instance(inst) => self.instance(buf, inst),
            SpecialKind::Memory(mem) => self.memory(buf, mem)?,
            SpecialKind::Tristate(t) => self.tristate(buf, t),
            SpecialKind::SynthesisDirective(d) => self.directive(buf, d),
            _ => {
                return Err(ElabError::MissingLowering {
                    special: special.describe(),
                })
            }
        }
        buf.write_eol();
        Ok(())
    }

    fn instance(&mut self, buf: &mut Buffer, inst: &Instance) {
        let hint = inst.name.clone().unwrap_or_else(|| inst.of.to_lowercase());
        let name = self.scope.claim(&hint);
        let params: Vec<String> = inst
            .items
            .iter()
            .filter_map(|item| match item {
                InstanceItem::Parameter(p, v) => Some(format!(".{p}({})", param_text(v))),
                _ => None,
            })
            .collect();
        let mut conns = Vec::new();
        for item in &inst.items {
            match item {
                InstanceItem::Input(p, v) => {
                    let text = self.operand(v);
                    conns.push(format!(".{p}({text})"));
                }
                InstanceItem::Output(p, v) | InstanceItem::InOut(p, v) => {
                    let text = self.target(v);
                    conns.push(format!(".{p}({text})"));
                }
                InstanceItem::Parameter(..) => {}
            }
        }
        if params.is_empty() {
            buf.line(format_args!("{} {name} (", inst.of));
        } else {
            buf.line(format_args!("{} #(", inst.of));
            buf.push_tab();
            write_list(buf, &params);
            buf.pop_tab();
            buf.line(format_args!(") {name} ("));
        }
        buf.push_tab();
        write_list(buf, &conns);
        buf.pop_tab();
        buf.line(format_args!(");"));
    }

    fn tristate(&mut self, buf: &mut Buffer, t: &Tristate) {
        let pad = self.names.get(&t.target).to_string();
        let oe = self.operand(&t.oe);
        let o = self.assign_rhs(&t.o, t.target.width());
        buf.line(format_args!("assign {pad} = {oe} ? {o} : {}'bz;", t.target.width()));
        if let Some(i) = &t.i {
            buf.line(format_args!("assign {} = {pad};", self.names.get(i)));
        }
    }

    fn directive(&mut self, buf: &mut Buffer, d: &SynthesisDirective) {
        let mut text = d.template.clone();
        for (i, s) in d.signals.iter().enumerate() {
            text = text.replace(&format!("{{{i}}}"), self.names.get(s));
        }
        buf.line(format_args!("// synthesis {text}"));
    }

    fn memory(&mut self, buf: &mut Buffer, mem: &Memory) -> ElabResult<()> {
        let name = self.scope.claim(&mem.name);
        let depth = mem.depth.max(1);
        buf.line(format_args!(
            "reg {}{name}[0:{}];",
            shape_prefix(Shape::unsigned(mem.width)),
            depth - 1
        ));
        if !mem.init.is_empty() {
            match self.memory_init {
                MemoryInitStyle::Inline => {
                    buf.line(format_args!("initial begin"));
                    buf.push_tab();
                    for (i, word) in mem.init.iter().enumerate() {
                        buf.line(format_args!("{name}[{i}] = {}'d{word};", mem.width));
                    }
                    buf.pop_tab();
                    buf.line(format_args!("end"));
                }
                MemoryInitStyle::File => {
                    let file = format!("{name}.init");
                    buf.line(format_args!("initial begin"));
                    buf.push_tab();
                    buf.line(format_args!("$readmemh(\"{file}\", {name});"));
                    buf.pop_tab();
                    buf.line(format_args!("end"));
                    self.data_files.push(DataFile {
                        name: file,
                        contents: hex_image(mem),
                    });
                }
            }
        }
        for (k, port) in mem.ports.iter().enumerate() {
            self.memory_port(buf, mem, &name, k, port)?;
        }
        Ok(())
    }

    fn memory_port(
        &mut self,
        buf: &mut Buffer,
        mem: &Memory,
        name: &str,
        k: usize,
        port: &MemoryPort,
    ) -> ElabResult<()> {
        let adr = self.names.get(&port.adr).to_string();
        let dat_r = self.names.get(&port.dat_r).to_string();
        let writes = port.we.is_some() && port.dat_w.is_some();
        let sync_read = !port.async_read;
        if !writes && !sync_read {
            buf.line(format_args!("assign {dat_r} = {name}[{adr}];"));
            return Ok(());
        }

        let clk = {
            let cd = self.domain(&port.domain)?;
            self.names.get(&cd.clk).to_string()
        };
        let register = if !sync_read {
            None
        } else if port.mode == WriteMode::WriteFirst {
            let reg = self.scope.claim(&format!("{name}_adr{k}"));
            buf.line(format_args!(
                "reg {}{reg};",
                shape_prefix(Shape::unsigned(mem.address_width()))
            ));
            Some(reg)
        } else {
            let reg = self.scope.claim(&format!("{name}_dat{k}"));
            buf.line(format_args!(
                "reg {}{reg};",
                shape_prefix(Shape::unsigned(mem.width))
            ));
            Some(reg)
        };

        buf.line(format_args!("always @(posedge {clk}) begin"));
        buf.push_tab();
        if let (Some(we), Some(dat_w)) = (&port.we, &port.dat_w) {
            let we = self.names.get(we).to_string();
            let dat_w = self.names.get(dat_w).to_string();
            let lanes = port.lanes(mem.width);
            if lanes == 1 {
                buf.line(format_args!("if ({we})"));
                buf.push_tab();
                buf.line(format_args!("{name}[{adr}] <= {dat_w};"));
                buf.pop_tab();
            } else {
                let g = port.we_granularity;
                for lane in 0..lanes {
                    let (lo, hi) = (lane * g, (lane + 1) * g - 1);
                    buf.line(format_args!("if ({we}[{lane}])"));
                    buf.push_tab();
                    buf.line(format_args!("{name}[{adr}][{hi}:{lo}] <= {dat_w}[{hi}:{lo}];"));
                    buf.pop_tab();
                }
            }
        }
        if let Some(reg) = &register {
            let update = if port.mode == WriteMode::WriteFirst {
                format!("{reg} <= {adr};")
            } else {
                format!("{reg} <= {name}[{adr}];")
            };
            let mut gates = Vec::new();
            if let Some(re) = &port.re {
                gates.push(self.names.get(re).to_string());
            }
            if port.mode == WriteMode::NoChange {
                if let Some(we) = &port.we {
                    gates.push(format!("~|{}", self.names.get(we)));
                }
            }
            if gates.is_empty() {
                buf.line(format_args!("{update}"));
            } else {
                buf.line(format_args!("if ({})", gates.join(" & ")));
                buf.push_tab();
                buf.line(format_args!("{update}"));
                buf.pop_tab();
            }
        }
        buf.pop_tab();
        buf.line(format_args!("end"));

        match (&register, port.mode) {
            (Some(reg), WriteMode::WriteFirst) => {
                buf.line(format_args!("assign {dat_r} = {name}[{reg}];"))
            }
            (Some(reg), _) => buf.line(format_args!("assign {dat_r} = {reg};")),
            (None, _) => buf.line(format_args!("assign {dat_r} = {name}[{adr}];")),
        }
        Ok(())
    }
}

fn write_list(buf: &mut Buffer, items: &[String]) {
    for (i, item) in items.iter().enumerate() {
        let sep = if i + 1 < items.len() { "," } else { "" };
        buf.line(format_args!("{item}{sep}"));
    }
}

fn param_text(value: &ParamValue) -> String {
    match value {
        ParamValue::Int(i) => i.to_string(),
        ParamValue::Str(s) => format!("\"{s}\""),
        ParamValue::Float(f) => format!("{f:?}"),
    }
}

/// One zero-padded hex word per line, covering the whole depth.
fn hex_image(mem: &Memory) -> String {
    let digits = mem.width.div_ceil(4).max(1) as usize;
    let zero = BigInt::from(0);
    let mut out = String::new();
    for i in 0..mem.depth {
        let word = mem.init.get(i).unwrap_or(&zero);
        out.push_str(&format!("{:0>digits$}\n", word.to_str_radix(16)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_ir::PortSpec;

    #[test]
    fn params_print_by_kind() {
        assert_eq!(param_text(&ParamValue::Int(-4)), "-4");
        assert_eq!(param_text(&ParamValue::Str("TRUE".into())), "\"TRUE\"");
        assert_eq!(param_text(&ParamValue::Float(2.5)), "2.5");
    }

    #[test]
    fn hex_image_pads_and_fills() {
        let mem = Memory::new("m", 12, 4).with_init([0xabu32, 1]);
        assert_eq!(hex_image(&mem), "0ab\n001\n000\n000\n");
    }

    #[test]
    fn write_granularity_lanes() {
        let mut mem = Memory::new("m", 16, 4);
        mem.add_port(PortSpec::write("w").we_granularity(8)).unwrap();
        assert_eq!(mem.ports[0].lanes(mem.width), 2);
    }
}
