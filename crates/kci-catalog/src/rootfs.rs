//! Root filesystem descriptors.

use serde::{Deserialize, Serialize};

/// Substring of a defconfig name marking a big-endian build.
pub const BIG_ENDIAN_MARKER: &str = "BIG_ENDIAN";

/// Byte order of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Big,
    Little,
}

impl Endianness {
    /// Derive the byte order from a defconfig name.
    pub fn from_defconfig(defconfig: &str) -> Self {
        if defconfig.contains(BIG_ENDIAN_MARKER) {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Endianness::Big => "big",
            Endianness::Little => "little",
        }
    }
}

impl std::fmt::Display for Endianness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of root filesystem image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsType {
    Ramdisk,
    Nfs,
}

/// URL formats per filesystem type; `{arch}` is substituted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlFormats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramdisk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfs: Option<String>,
}

impl UrlFormats {
    pub fn get(&self, fs_type: FsType) -> Option<&str> {
        match fs_type {
            FsType::Ramdisk => self.ramdisk.as_deref(),
            FsType::Nfs => self.nfs.as_deref(),
        }
    }
}

/// Override of the architecture name used in rootfs URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchAlias {
    pub arch: String,
    pub endian: Endianness,
    pub name: String,
}

/// Built-in (arch, endianness) -> URL arch name table.
const DEFAULT_ARCH_NAMES: &[(&str, Endianness, &str)] = &[
    ("arm", Endianness::Little, "armel"),
    ("arm", Endianness::Big, "armeb"),
    ("arm64", Endianness::Little, "arm64"),
    ("arm64", Endianness::Big, "arm64be"),
    ("mips", Endianness::Little, "mipsel"),
    ("x86", Endianness::Little, "x86"),
];

fn default_boot_protocol() -> String {
    "tftp".to_string()
}

fn default_root_type() -> String {
    "ramdisk".to_string()
}

fn default_prompt() -> String {
    "/ #".to_string()
}

/// Root filesystem entry as written in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootFs {
    /// Catalog key; filled in on load
    #[serde(skip)]
    pub name: String,

    #[serde(default = "default_boot_protocol")]
    pub boot_protocol: String,

    #[serde(default = "default_root_type")]
    pub root_type: String,

    /// Login prompt printed by the image
    #[serde(default = "default_prompt")]
    pub prompt: String,

    #[serde(default)]
    pub url_formats: UrlFormats,

    #[serde(default)]
    pub arch_map: Vec<ArchAlias>,
}

impl RootFs {
    /// Architecture name as it appears in rootfs URLs.
    pub fn arch_name<'a>(&'a self, arch: &'a str, endian: Endianness) -> &'a str {
        if let Some(alias) = self
            .arch_map
            .iter()
            .find(|a| a.arch == arch && a.endian == endian)
        {
            return &alias.name;
        }
        DEFAULT_ARCH_NAMES
            .iter()
            .find(|(a, e, _)| *a == arch && *e == endian)
            .map(|(_, _, name)| *name)
            .unwrap_or(arch)
    }

    /// URL of the given image type, if this rootfs provides one.
    pub fn get_url(&self, fs_type: FsType, arch: &str, endian: Endianness) -> Option<String> {
        self.url_formats
            .get(fs_type)
            .map(|fmt| fmt.replace("{arch}", self.arch_name(arch, endian)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buildroot() -> RootFs {
        let mut rootfs: RootFs = toml::from_str(
            r#"
            [url_formats]
            ramdisk = "http://storage.kernelci.org/images/rootfs/buildroot/{arch}/base/rootfs.cpio.gz"
            nfs = "http://storage.kernelci.org/images/rootfs/buildroot/{arch}/base/rootfs.tar.xz"

            [[arch_map]]
            arch = "mips"
            endian = "big"
            name = "mipseb"
            "#,
        )
        .unwrap();
        rootfs.name = "buildroot".to_string();
        rootfs
    }

    #[test]
    fn test_endianness_from_defconfig() {
        assert_eq!(Endianness::from_defconfig("multi_v7_defconfig"), Endianness::Little);
        assert_eq!(
            Endianness::from_defconfig("defconfig+CONFIG_CPU_BIG_ENDIAN=y"),
            Endianness::Big
        );
        assert_eq!(Endianness::from_defconfig("big_endian_defconfig"), Endianness::Little);
    }

    #[test]
    fn test_endianness_derivation_is_stable() {
        let cases = [
            ("", Endianness::Little),
            ("BIG_ENDIAN", Endianness::Big),
            ("defconfig", Endianness::Little),
            ("x+CONFIG_CPU_BIG_ENDIAN=y", Endianness::Big),
        ];
        for (defconfig, expected) in cases {
            let endian = Endianness::from_defconfig(defconfig);
            assert_eq!(endian, expected, "{}", defconfig);
            assert_eq!(Endianness::from_defconfig(defconfig), endian);
        }
    }

    #[test]
    fn test_defaults() {
        let rootfs = buildroot();
        assert_eq!(rootfs.boot_protocol, "tftp");
        assert_eq!(rootfs.root_type, "ramdisk");
        assert_eq!(rootfs.prompt, "/ #");
    }

    #[test]
    fn test_get_url_arch_names() {
        let rootfs = buildroot();
        assert_eq!(
            rootfs.get_url(FsType::Ramdisk, "arm", Endianness::Little).unwrap(),
            "http://storage.kernelci.org/images/rootfs/buildroot/armel/base/rootfs.cpio.gz"
        );
        assert_eq!(
            rootfs.get_url(FsType::Nfs, "arm64", Endianness::Big).unwrap(),
            "http://storage.kernelci.org/images/rootfs/buildroot/arm64be/base/rootfs.tar.xz"
        );
        assert_eq!(
            rootfs.get_url(FsType::Ramdisk, "riscv", Endianness::Little).unwrap(),
            "http://storage.kernelci.org/images/rootfs/buildroot/riscv/base/rootfs.cpio.gz"
        );
        assert_eq!(rootfs.arch_name("mips", Endianness::Big), "mipseb");
    }

    #[test]
    fn test_missing_url_format() {
        let rootfs: RootFs = toml::from_str("prompt = \"root@debian:~#\"").unwrap();
        assert_eq!(rootfs.get_url(FsType::Nfs, "arm", Endianness::Little), None);
        assert_eq!(rootfs.prompt, "root@debian:~#");
    }
}
