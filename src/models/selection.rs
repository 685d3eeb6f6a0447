use std::collections::BTreeMap;

use glam::DVec3;
use tracing::trace;

/// 追跡対象の位置の算術平均（重心）
///
/// 空の場合は定義されないため`None`を返します。
pub fn centroid(members: &BTreeMap<String, DVec3>) -> Option<DVec3> {
    if members.is_empty() {
        return None;
    }
    let sum = members.values().fold(DVec3::ZERO, |acc, p| acc + *p);
    Some(sum / members.len() as f64)
}

/// 追跡対象の高さ（Y）の平均
pub fn average_height(members: &BTreeMap<String, DVec3>) -> Option<f64> {
    if members.is_empty() {
        return None;
    }
    let sum: f64 = members.values().map(|p| p.y).sum();
    Some(sum / members.len() as f64)
}

/// 選択グループの原点
///
/// 選択中のエンティティの重心を毎フレーム再計算し、命令ビーコンが
/// 設定されている場合は重心からビーコンへの4点のロケータ線を提供します。
#[derive(Debug, Clone, Default)]
pub struct SelectionGroup {
    pub id: String,
    members: BTreeMap<String, DVec3>,
    origin: Option<DVec3>,
    order_beacon: Option<DVec3>,
}

impl SelectionGroup {
    pub fn new(id: String) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// 所属エンティティの位置を更新し、原点を再計算
    pub fn update(&mut self, members: BTreeMap<String, DVec3>) {
        self.members = members;
        if let Some(origin) = centroid(&self.members) {
            self.origin = Some(origin);
        }
        trace!(group = %self.id, members = self.members.len(), "選択グループ更新");
    }

    pub fn members(&self) -> &BTreeMap<String, DVec3> {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// グループ原点（空のグループでは最後に計算された位置を保持）
    pub fn origin(&self) -> Option<DVec3> {
        self.origin
    }

    pub fn average_height(&self) -> Option<f64> {
        average_height(&self.members)
    }

    pub fn set_order_beacon(&mut self, beacon: Option<DVec3>) {
        self.order_beacon = beacon;
    }

    pub fn order_beacon(&self) -> Option<DVec3> {
        self.order_beacon
    }

    /// ロケータ線 `[原点, ビーコン, ビーコン直下（原点の高さ）, 原点]`
    ///
    /// ビーコン未設定の場合は非表示（`None`）です。
    pub fn locator_line(&self) -> Option<[DVec3; 4]> {
        let start = self.origin?;
        let end = self.order_beacon?;
        Some([start, end, DVec3::new(end.x, start.y, end.z), start])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(points: &[(&str, DVec3)]) -> BTreeMap<String, DVec3> {
        points
            .iter()
            .map(|(id, p)| (id.to_string(), *p))
            .collect()
    }

    #[test]
    fn test_centroid_of_three() {
        let mut group = members(&[
            ("a", DVec3::new(0.0, 0.0, 0.0)),
            ("b", DVec3::new(3.0, 0.0, 0.0)),
            ("c", DVec3::new(0.0, 3.0, 0.0)),
        ]);
        assert_eq!(centroid(&group), Some(DVec3::new(1.0, 1.0, 0.0)));

        group.remove("b");
        assert_eq!(centroid(&group), Some(DVec3::new(0.0, 1.5, 0.0)));
        assert_eq!(average_height(&group), Some(1.5));
    }

    #[test]
    fn test_empty_group_has_no_centroid() {
        let empty = BTreeMap::new();
        assert_eq!(centroid(&empty), None);
        assert_eq!(average_height(&empty), None);
    }

    #[test]
    fn test_locator_line_flattens_to_origin_height() {
        let mut group = SelectionGroup::new("G1".to_string());
        group.update(members(&[
            ("a", DVec3::new(0.0, 2.0, 0.0)),
            ("b", DVec3::new(2.0, 2.0, 2.0)),
        ]));
        assert!(group.locator_line().is_none());

        group.set_order_beacon(Some(DVec3::new(10.0, 8.0, 4.0)));
        let line = group.locator_line().unwrap();
        let origin = DVec3::new(1.0, 2.0, 1.0);
        assert_eq!(line[0], origin);
        assert_eq!(line[1], DVec3::new(10.0, 8.0, 4.0));
        assert_eq!(line[2], DVec3::new(10.0, 2.0, 4.0));
        assert_eq!(line[3], origin);

        group.set_order_beacon(None);
        assert!(group.locator_line().is_none());
    }

    #[test]
    fn test_origin_kept_when_group_empties() {
        let mut group = SelectionGroup::new("G1".to_string());
        group.update(members(&[("a", DVec3::new(4.0, 0.0, 4.0))]));
        group.update(BTreeMap::new());
        assert!(group.is_empty());
        assert_eq!(group.origin(), Some(DVec3::new(4.0, 0.0, 4.0)));
    }
}
