#![no_main]
use espresso_hardware::codec::{decode_command, encode_command};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must survive a re-encode with its discrete fields intact.
    if let Ok(cmd) = decode_command(data) {
        let again = decode_command(&encode_command(&cmd)).expect("re-encoded command decodes");
        assert_eq!(again.pump_mode, cmd.pump_mode);
        assert_eq!(again.flow_direction, cmd.flow_direction);
        assert_eq!(again.tare.is_armed(), cmd.tare.is_armed());
    }
});
