//! Arista EOS platform definition.
//!
//! Prompt patterns are adapted from [scrapli](https://github.com/carlmontanari/scrapli).
//!
//! # Prompt Examples
//!
//! ```text
//! switch>                            # exec mode
//! switch#                            # privilege_exec mode
//! switch(config)#                    # configuration mode
//! switch(vrf:MGMT)#                  # privilege_exec in a routing context
//! ```

use super::PlatformDefinition;

/// On-box CLI binary; its presence means we are running on the switch.
pub const FASTCLI_PATH: &str = "/usr/bin/FastCli";

/// Where EOS keeps flash: on its Linux filesystem.
pub const FLASH_DIR: &str = "/mnt/flash";

const PROMPT: &str = r"(?mi)^[\w.\-@()/: ]{1,63}[>#]\s?\z";
const EXEC_PROMPT: &str = r"(?mi)^[\w.\-@()/: ]{1,63}>\s?\z";

/// Create the Arista EOS platform definition.
pub fn platform() -> PlatformDefinition {
    PlatformDefinition::new("arista_eos", PROMPT)
        .and_then(|p| p.with_enable(EXEC_PROMPT, "enable"))
        .expect("static EOS prompt patterns compile")
        .with_failure_pattern("% Ambiguous command")
        .with_failure_pattern("% Error")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Invalid input")
        .with_failure_pattern("% Unavailable command")
        .with_failure_pattern("% Authorization denied")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 32767")
        .with_terminal_size(32767, 24)
}
