use std::path::PathBuf;

use argp::FromArgs;

/// A post-link packer for ARM handheld ROM/multiboot images.
#[derive(FromArgs, PartialEq, Debug)]
#[argp(description = "Pack a linked ELF32 executable or raw multiboot image into a boot-ready output image.")]
pub struct Args {
    #[argp(switch, short = '0')]
    #[argp(description = "disable compression (all sections fall back to BIOS copy/fill)")]
    pub no_compress: bool,

    #[argp(option, short = 'L')]
    #[argp(description = "delegate VRAM-bound section compression to an external LZSS tool")]
    pub external_tool: Option<PathBuf>,

    #[argp(switch, short = 'V')]
    #[argp(description = "print version information and exit")]
    pub version: bool,

    #[argp(option, short = 'v', default = "0")]
    #[argp(description = "Logging level (0 = Off, 1 = Error, 2 = Warn, 3 = Info, 4 = Debug, 5 = Trace)")]
    pub verbose: usize,

    #[argp(positional)]
    #[argp(description = "input ELF32 executable or raw multiboot image")]
    pub input: Option<PathBuf>,

    #[argp(positional)]
    #[argp(description = "output image path")]
    pub output: Option<PathBuf>,
}
