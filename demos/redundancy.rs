use aclrel::{extract_blocks, group_block, GroupingOptions, Parser};

const CONFIG: &str = "\
hostname core-1
ip access-list extended WEB-IN
 10 remark web tier
 20 permit tcp 10.0.0.0/16 any eq 443
 30 permit tcp 10.0.4.0/24 any eq 443
 40 permit tcp any eq 443 10.0.0.0/16
 50 permit udp 10.0.0.0 0.0.255.255 any eq domain
 60 permit udp host 10.0.9.9 any eq 53
ip access-list VTY-MGMT
 permit tcp 10.9.0.0/16 any eq 22
";

fn main() {
    let column = (1..).zip(CONFIG.lines());
    let parser = Parser::default();

    for block in extract_blocks(column) {
        let report = group_block(&block, &parser, &GroupingOptions::default());
        println!("{report}");

        for group in report.groups() {
            println!("  keep row {}, recycle rows {:?}", group.keep, group.recyclable);
        }
        for warning in report.warnings() {
            println!("  warning: {warning}");
        }
    }
}
