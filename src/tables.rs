//! Built-in instruction tables, one per supported engine build.

use std::str::FromStr;

use thiserror::Error;

use crate::schema::{InsSchema, SchemaTable};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown engine build '{0}'")]
pub struct UnknownBuild(String);

/// Engine builds with a known instruction set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Build {
    /// Innocent Grey's Flowers series.
    #[default]
    Flowers,
}

impl Build {
    pub fn table(self) -> SchemaTable {
        match self {
            Build::Flowers => flowers(),
        }
    }
}

impl FromStr for Build {
    type Err = UnknownBuild;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flowers" => Ok(Build::Flowers),
            _ => Err(UnknownBuild(s.to_string())),
        }
    }
}

/// Instruction set of the Flowers engine. Opcodes nobody has pinned down yet
/// keep placeholder `unk_` mnemonics; where one opcode duplicates another's
/// role the mnemonic carries its opcode as a suffix.
pub fn flowers() -> SchemaTable {
    let mut t = SchemaTable::new(encoding_rs::SHIFT_JIS);

    t.define(0x00, InsSchema::new("dlg_str").uint(1).strlen(1))
        .define(0x01, InsSchema::new("exit").uint(2))
        .define(0x02, InsSchema::new("jmp_script").uint(1).strlen(1))
        .define(0x04, InsSchema::new("val_set").uint(2).int(4))
        .define(0x05, InsSchema::new("val_add").uint(2).int(4))
        .define(
            0x06,
            InsSchema::new("jmp_eq").raw(2).uint(2).raw(2).uint(4).offset(4),
        )
        .define(
            0x08,
            InsSchema::new("jmp_be").raw(2).uint(2).raw(2).uint(4).offset(4),
        )
        .define(
            0x09,
            InsSchema::new("jmp_le").raw(2).uint(2).raw(2).uint(4).offset(4),
        )
        .define(0x0C, InsSchema::new("dlg_num").uint(2).int(4))
        .define(0x0D, InsSchema::new("jmp").uint(2).offset(4))
        .define(0x0E, InsSchema::new("wait").uint(2).int(4))
        .define(0x0F, InsSchema::new("bg_0f").uint(1).strlen(1))
        .define(0x10, InsSchema::new("bg_10").uint(1).strlen(1))
        .define(0x11, InsSchema::new("fg_clear").uint(6))
        .define(0x12, InsSchema::new("fg_12").uint(1).strlen(1))
        .define(
            0x13,
            InsSchema::new("fg_metrics").uint(1).uint(1).int(2).int(2),
        )
        .define(0x14, InsSchema::new("crossfade").uint(2).int(4))
        .define(
            0x16,
            InsSchema::new("bg_color").uint(2).uint(1).uint(1).uint(1).uint(1),
        )
        .define(0x1B, InsSchema::new("sel_end").uint(2))
        .define(0x1C, InsSchema::new("sel_beg").uint(2))
        .define(0x1D, InsSchema::new("sel_add").strlen(2).offset(4))
        .define(0x1E, InsSchema::new("unk_1e").uint(1).uint(1))
        .define(0x21, InsSchema::new("mark_end").uint(2))
        .define(
            0x22,
            InsSchema::new("bgm_play").uint(1).uint(1).raw(3).strlen(1),
        )
        .define(0x23, InsSchema::new("bgm_stop").uint(2))
        .define(0x24, InsSchema::new("bgm_fadeout").uint(2).int(4))
        .define(
            0x25,
            InsSchema::new("bgm_fadein").uint(1).uint(1).int(4).strlen(1).raw(3),
        )
        .define(0x27, InsSchema::new("v_play").raw(5).strlen(1))
        .define(
            0x28,
            InsSchema::new("se_play").uint(1).uint(1).raw(3).strlen(1),
        )
        .define(0x29, InsSchema::new("se_stop").uint(2))
        .define(0x2A, InsSchema::new("v_stop").uint(2))
        .define(0x2C, InsSchema::new("se_fadeout").uint(2).uint(4))
        .define(
            0x2D,
            InsSchema::new("se_fadein").uint(1).uint(1).int(4).strlen(1).raw(3),
        )
        .define(0x35, InsSchema::new("yuri").uint(1).uint(1))
        .define(0x36, InsSchema::new("unk_36").uint(1).uint(1))
        .define(0x3A, InsSchema::new("unk_3a").uint(2))
        .define(0x3B, InsSchema::new("jmp_nishuume").uint(2).offset(4))
        .define(0x3F, InsSchema::new("add_backlog").uint(1).strlen(1))
        .define(0x40, InsSchema::new("dlg_mode_40").uint(2))
        .define(0x4C, InsSchema::new("dlg_clear").uint(2))
        .define(0x4D, InsSchema::new("dlg_fade").uint(1).uint(1).int(4))
        .define(0x50, InsSchema::new("scr_eff").raw(2).uint(4).uint(4))
        .define(0x51, InsSchema::new("scr_eff_stop").raw(3))
        .define(0x54, InsSchema::new("wait_click").uint(2))
        .define(0x57, InsSchema::new("unk_57").uint(2))
        .define(0x5D, InsSchema::new("unk_5d").uint(2))
        .define(0x5E, InsSchema::new("unk_5e").uint(2))
        .define(0x5F, InsSchema::new("unk_5f").uint(2).offset(4))
        .define(0x60, InsSchema::new("unk_60").raw(82))
        .define(0x61, InsSchema::new("unk_61").uint(1).uint(1))
        .define(
            0x72,
            InsSchema::new("fg_anim_a")
                .uint(1)
                .uint(1)
                .int(2)
                .int(2)
                .int(2)
                .int(2)
                .int(2)
                .raw(2)
                .int(2)
                .int(2),
        )
        .define(
            0x73,
            InsSchema::new("fg_anim_b")
                .uint(1)
                .uint(1)
                .int(2)
                .int(2)
                .int(2)
                .int(2)
                .int(2)
                .raw(2)
                .int(2)
                .int(2),
        )
        .define(0x74, InsSchema::new("fg_anim_start").uint(2))
        .define(0x75, InsSchema::new("fg_anim_stop").uint(2))
        .define(0x83, InsSchema::new("unk_83").raw(2).int(4))
        .define(0x8B, InsSchema::new("unk_8b").uint(2))
        .define(0x9C, InsSchema::new("fg_9c").uint(1).strlen(1))
        .define(0xB2, InsSchema::new("play_video").raw(2).uint(2).raw(2))
        .define(0xB3, InsSchema::new("play_credits").uint(1).uint(1))
        .define(0xB4, InsSchema::new("fg_avatar").uint(1).strlen(1))
        .define(0xB6, InsSchema::new("dlg_mode_b6").uint(2))
        .define(0xB8, InsSchema::new("nop_chapter").uint(1).uint(1))
        .define(0xBA, InsSchema::new("unk_ba").uint(2))
        .define(
            0xBB,
            InsSchema::new("bgm_vol_bb").uint(1).uint(1).uint(2).raw(2),
        )
        .define(
            0xBC,
            InsSchema::new("bgm_vol_bc").uint(1).uint(1).uint(2).raw(2),
        )
        .define(
            0xBD,
            InsSchema::new("glb_volume_bd").uint(1).uint(1).uint(2).raw(2),
        )
        .define(
            0xBE,
            InsSchema::new("glb_volume_be").uint(1).uint(1).uint(2).raw(2),
        )
        .define(0xBF, InsSchema::new("unk_bf").raw(14))
        .define(0xC0, InsSchema::new("unk_c0").raw(14));

    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_from_str() {
        assert_eq!("flowers".parse(), Ok(Build::Flowers));
        assert_eq!(
            "bloom".parse::<Build>(),
            Err(UnknownBuild("bloom".to_string()))
        );
    }

    // the constructor asserts table consistency, so building it at all is
    // already a test
    #[test]
    fn test_flowers_table_shape() {
        let table = Build::default().table();

        let (opcode, jmp) = table.lookup("jmp").unwrap();
        assert_eq!(opcode, 0x0D);
        assert_eq!(jmp.fixed_len(), 8);

        let cond = table.schema(0x06).unwrap();
        assert_eq!(cond.mnemonic(), "jmp_eq");
        assert_eq!(cond.fixed_len(), 16);
        assert!(!cond.has_strlen());

        let sel = table.schema(0x1D).unwrap();
        assert!(sel.has_strlen());

        assert_eq!(table.schemas().count(), 69);
    }
}
